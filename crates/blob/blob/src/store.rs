use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ObjectStoreError;
use crate::key::StorageKey;

/// Pluggable object storage backend for record media.
///
/// Implementors provide the actual storage mechanism (e.g. S3, GCS, a
/// hosted bucket service). The pipeline ships an in-memory backend for
/// tests and local development; production deployments bring their own.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store one blob under the given key, overwriting any previous value.
    async fn put(&self, key: &StorageKey, data: Bytes) -> Result<(), ObjectStoreError>;

    /// Remove a batch of blobs, best effort.
    ///
    /// Keys that do not exist are skipped silently. Partial failures are
    /// surfaced as a single [`ObjectStoreError::PartialRemoval`] after the
    /// whole batch has been attempted.
    async fn remove(&self, keys: &[StorageKey]) -> Result<(), ObjectStoreError>;

    /// Render the public URL for a key. Pure; performs no I/O.
    fn public_url(&self, key: &StorageKey) -> String;
}
