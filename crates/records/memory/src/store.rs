use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use herbarium_core::{AggregateRecord, OwnerId, PhotoId, PhotoRef, RecordFields, RecordId};
use herbarium_records::{RecordStore, RecordStoreError};

#[derive(Debug, Clone)]
struct RecordRow {
    owner: OwnerId,
    fields: RecordFields,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PhotoRow {
    record_id: RecordId,
    url: String,
    // Insertion sequence; DashMap iteration order is arbitrary.
    seq: u64,
}

/// In-memory [`RecordStore`] backed by [`DashMap`]s.
///
/// Identifiers are UUID v4 strings. Deleting a record cascades to its
/// photo rows, matching the relational backend's foreign-key behavior.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: DashMap<String, RecordRow>,
    photos: DashMap<String, PhotoRow>,
    photo_seq: AtomicU64,
}

impl MemoryRecordStore {
    /// Create a new, empty in-memory record store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parent records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of photo-reference rows across all records.
    #[must_use]
    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_record(
        &self,
        owner: &OwnerId,
        fields: &RecordFields,
    ) -> Result<RecordId, RecordStoreError> {
        let id = Uuid::new_v4().to_string();
        self.records.insert(
            id.clone(),
            RecordRow {
                owner: owner.clone(),
                fields: fields.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(RecordId::new(id))
    }

    async fn update_record(
        &self,
        id: &RecordId,
        fields: &RecordFields,
    ) -> Result<(), RecordStoreError> {
        let mut row = self
            .records
            .get_mut(id.as_str())
            .ok_or_else(|| RecordStoreError::NotFound(id.to_string()))?;
        row.fields = fields.clone();
        Ok(())
    }

    async fn delete_record(&self, id: &RecordId) -> Result<(), RecordStoreError> {
        self.records
            .remove(id.as_str())
            .ok_or_else(|| RecordStoreError::NotFound(id.to_string()))?;
        // Cascade: drop every photo row that referenced the record.
        self.photos.retain(|_, photo| photo.record_id != *id);
        Ok(())
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<AggregateRecord>, RecordStoreError> {
        Ok(self.records.get(id.as_str()).map(|row| AggregateRecord {
            id: id.clone(),
            owner: row.owner.clone(),
            fields: row.fields.clone(),
            created_at: row.created_at,
        }))
    }

    async fn insert_photo_refs(
        &self,
        record_id: &RecordId,
        urls: &[String],
    ) -> Result<Vec<PhotoRef>, RecordStoreError> {
        if !self.records.contains_key(record_id.as_str()) {
            return Err(RecordStoreError::NotFound(record_id.to_string()));
        }

        let mut inserted = Vec::with_capacity(urls.len());
        for url in urls {
            let id = Uuid::new_v4().to_string();
            let seq = self.photo_seq.fetch_add(1, Ordering::SeqCst);
            self.photos.insert(
                id.clone(),
                PhotoRow {
                    record_id: record_id.clone(),
                    url: url.clone(),
                    seq,
                },
            );
            inserted.push(PhotoRef {
                id: PhotoId::new(id),
                url: url.clone(),
            });
        }
        Ok(inserted)
    }

    async fn delete_photo_refs(&self, ids: &[PhotoId]) -> Result<(), RecordStoreError> {
        for id in ids {
            self.photos.remove(id.as_str());
        }
        Ok(())
    }

    async fn list_photo_refs(
        &self,
        record_id: &RecordId,
    ) -> Result<Vec<PhotoRef>, RecordStoreError> {
        let mut rows: Vec<(u64, PhotoRef)> = self
            .photos
            .iter()
            .filter(|entry| entry.record_id == *record_id)
            .map(|entry| {
                (
                    entry.seq,
                    PhotoRef {
                        id: PhotoId::new(entry.key().clone()),
                        url: entry.url.clone(),
                    },
                )
            })
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, photo)| photo).collect())
    }
}
