use async_trait::async_trait;

use herbarium_core::{AggregateRecord, OwnerId, PhotoId, PhotoRef, RecordFields, RecordId};

use crate::error::RecordStoreError;

/// Relational store for parent records and their photo-reference rows.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// The store owns identifier minting: inserted rows come back with fresh
/// ids, and callers treat those ids as opaque and immutable.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new parent record and return its minted identifier.
    async fn insert_record(
        &self,
        owner: &OwnerId,
        fields: &RecordFields,
    ) -> Result<RecordId, RecordStoreError>;

    /// Overwrite the scalar fields of an existing record.
    async fn update_record(
        &self,
        id: &RecordId,
        fields: &RecordFields,
    ) -> Result<(), RecordStoreError>;

    /// Delete a record. Cascades to its photo-reference rows.
    async fn delete_record(&self, id: &RecordId) -> Result<(), RecordStoreError>;

    /// Fetch one record with its identity and ownership, or `None`.
    async fn get_record(&self, id: &RecordId) -> Result<Option<AggregateRecord>, RecordStoreError>;

    /// Insert photo-reference rows linking a record to public URLs.
    /// Returns the stored rows in insertion order.
    async fn insert_photo_refs(
        &self,
        record_id: &RecordId,
        urls: &[String],
    ) -> Result<Vec<PhotoRef>, RecordStoreError>;

    /// Delete photo-reference rows by id. Missing ids are skipped.
    async fn delete_photo_refs(&self, ids: &[PhotoId]) -> Result<(), RecordStoreError>;

    /// List a record's photo-reference rows in insertion order.
    async fn list_photo_refs(
        &self,
        record_id: &RecordId,
    ) -> Result<Vec<PhotoRef>, RecordStoreError>;
}
