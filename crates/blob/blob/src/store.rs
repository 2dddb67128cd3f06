use async_trait::async_trait;

use crate::body::BlobBody;
use crate::error::BlobError;

/// Pluggable storage for opaque payloads, addressed by key.
///
/// Implementations must be `Send + Sync` and safe for concurrent access;
/// a single instance is shared by every request handler and the reaper.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The bucket, directory or other namespace this store writes into.
    fn namespace(&self) -> &str;

    /// Create the namespace if it does not exist yet.
    ///
    /// Called once at startup. The default implementation does nothing.
    async fn ensure_namespace(&self) -> Result<(), BlobError> {
        Ok(())
    }

    /// Store `body` under `key`.
    ///
    /// The body must yield exactly `size` bytes; otherwise the call fails
    /// with [`BlobError::SizeMismatch`] and no object is left behind.
    async fn put(
        &self,
        key: &str,
        body: BlobBody,
        size: u64,
        content_type: &str,
    ) -> Result<(), BlobError>;

    /// Open a read stream for `key`.
    ///
    /// Returns [`BlobError::NotFound`] if no object is stored under `key`.
    async fn get(&self, key: &str) -> Result<BlobBody, BlobError>;

    /// Delete the object stored under `key`.
    ///
    /// Idempotent: deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Probe whether an object is stored under `key`.
    async fn exists(&self, key: &str) -> Result<bool, BlobError>;
}
