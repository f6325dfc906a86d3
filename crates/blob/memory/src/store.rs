use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use herbarium_blob::{ObjectStore, ObjectStoreError, StorageKey};

/// In-memory [`ObjectStore`] backed by a [`DashMap`].
///
/// Fully synchronous internally; the async trait methods return
/// immediately. Public URLs are rendered as `{base_url}/{key}` so the
/// key convention stays reversible in tests.
#[derive(Debug)]
pub struct MemoryObjectStore {
    base_url: String,
    objects: DashMap<String, Bytes>,
}

impl MemoryObjectStore {
    /// Create an empty store serving URLs under the given base.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            objects: DashMap::new(),
        }
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Whether an object exists for the key.
    #[must_use]
    pub fn contains(&self, key: &StorageKey) -> bool {
        self.objects.contains_key(key.as_str())
    }

    /// Fetch a stored object's bytes, if present.
    #[must_use]
    pub fn get(&self, key: &StorageKey) -> Option<Bytes> {
        self.objects.get(key.as_str()).map(|entry| entry.value().clone())
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://media")
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &StorageKey, data: Bytes) -> Result<(), ObjectStoreError> {
        self.objects.insert(key.as_str().to_owned(), data);
        Ok(())
    }

    async fn remove(&self, keys: &[StorageKey]) -> Result<(), ObjectStoreError> {
        // Missing keys are treated as already removed.
        for key in keys {
            self.objects.remove(key.as_str());
        }
        Ok(())
    }

    fn public_url(&self, key: &StorageKey) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> StorageKey {
        StorageKey::new(raw)
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryObjectStore::default();
        let k = key("u/1-a.jpg");

        store.put(&k, Bytes::from_static(b"jpeg")).await.unwrap();

        assert!(store.contains(&k));
        assert_eq!(store.get(&k).unwrap(), Bytes::from_static(b"jpeg"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = MemoryObjectStore::default();
        let a = key("u/1-a.jpg");
        let b = key("u/2-b.jpg");

        store.put(&a, Bytes::from_static(b"x")).await.unwrap();

        // One present key, one missing key: both succeed.
        store.remove(&[a.clone(), b]).await.unwrap();
        assert!(store.is_empty());

        store.remove(&[a]).await.unwrap();
    }

    #[tokio::test]
    async fn public_url_roundtrips_through_key_recovery() {
        let store = MemoryObjectStore::new("https://cdn.example/media/");
        let k = key("user-7/1712000000000-abcd1234.jpg");

        let url = store.public_url(&k);
        assert_eq!(
            url,
            "https://cdn.example/media/user-7/1712000000000-abcd1234.jpg"
        );
        assert_eq!(StorageKey::from_public_url(&url).unwrap(), k);
    }
}
