use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use vanish_blob::{BlobBody, BlobError, BlobStore};

/// A single stored object.
#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// In-memory [`BlobStore`] backed by a [`DashMap`].
///
/// Objects live for the lifetime of the process. Intended for tests and
/// single-node development setups.
#[derive(Debug)]
pub struct MemoryBlobStore {
    namespace: String,
    objects: DashMap<String, StoredObject>,
}

impl MemoryBlobStore {
    /// Create a new, empty store with the namespace `"memory"`.
    pub fn new() -> Self {
        Self::with_namespace("memory")
    }

    /// Create a new, empty store reporting the given namespace.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            objects: DashMap::new(),
        }
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Content type recorded for `key`, if stored.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.get(key).map(|o| o.content_type.clone())
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn put(
        &self,
        key: &str,
        body: BlobBody,
        size: u64,
        content_type: &str,
    ) -> Result<(), BlobError> {
        // Buffer first so a bad body never replaces or creates an entry.
        let data = body.collect_exact(size).await?;
        self.objects.insert(
            key.to_owned(),
            StoredObject {
                data,
                content_type: content_type.to_owned(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<BlobBody, BlobError> {
        let data = self
            .objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| BlobError::NotFound(key.to_owned()))?;
        Ok(BlobBody::from_bytes(data))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.objects.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        Ok(self.objects.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use vanish_blob::testing::run_blob_store_conformance_tests;

    use super::*;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryBlobStore::new();
        run_blob_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn records_content_type() {
        let store = MemoryBlobStore::new();
        store
            .put("k", BlobBody::from_bytes("{}"), 2, "application/json")
            .await
            .unwrap();
        assert_eq!(store.content_type("k").as_deref(), Some("application/json"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn namespace_is_reported() {
        let store = MemoryBlobStore::with_namespace("scratch");
        assert_eq!(store.namespace(), "scratch");
        store.ensure_namespace().await.unwrap();
    }
}
