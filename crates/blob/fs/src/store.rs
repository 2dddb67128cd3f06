use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};

use vanish_blob::{BlobBody, BlobError, BlobStore};

/// Suffix of in-flight uploads.
const PARTIAL_SUFFIX: &str = "part";

/// Filesystem-backed [`BlobStore`].
///
/// Objects for namespace `ns` live in `<base>/<ns>/<key>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    namespace: String,
    dir: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `base`, writing into the `namespace`
    /// subdirectory. The directory is created by
    /// [`ensure_namespace`](BlobStore::ensure_namespace).
    pub fn new(base: impl AsRef<Path>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let dir = base.as_ref().join(&namespace);
        Self { namespace, dir }
    }

    /// Directory holding this store's objects.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve `key` to a path, refusing anything that could escape `dir`.
    fn object_path(&self, key: &str) -> Result<PathBuf, BlobError> {
        let acceptable = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if !acceptable || key.contains("..") {
            return Err(BlobError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(key))
    }
}

/// An in-flight upload's partial file, removed on drop unless committed.
///
/// Covers puts abandoned mid-copy, such as one dropped by a timeout.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "partial upload removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to remove partial upload");
            }
        }
    }
}

fn io_error(err: &io::Error) -> BlobError {
    BlobError::Backend(err.to_string())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn ensure_namespace(&self) -> Result<(), BlobError> {
        fs::create_dir_all(&self.dir).await.map_err(|e| io_error(&e))?;
        debug!(dir = %self.dir.display(), "blob directory ready");
        Ok(())
    }

    #[instrument(skip(self, body), fields(namespace = %self.namespace))]
    async fn put(
        &self,
        key: &str,
        body: BlobBody,
        size: u64,
        _content_type: &str,
    ) -> Result<(), BlobError> {
        let path = self.object_path(key)?;
        let mut partial = PartialFile {
            path: self.dir.join(format!("{key}.{PARTIAL_SUFFIX}")),
            committed: false,
        };

        let mut file = fs::File::create(&partial.path)
            .await
            .map_err(|e| io_error(&e))?;

        let mut stream = body.into_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| BlobError::Payload(e.to_string()))?;
            written += chunk.len() as u64;
            if written > size {
                return Err(BlobError::SizeMismatch {
                    expected: size,
                    actual: written,
                });
            }
            file.write_all(&chunk).await.map_err(|e| io_error(&e))?;
        }
        if written != size {
            return Err(BlobError::SizeMismatch {
                expected: size,
                actual: written,
            });
        }
        file.sync_all().await.map_err(|e| io_error(&e))?;
        drop(file);

        fs::rename(&partial.path, &path)
            .await
            .map_err(|e| io_error(&e))?;
        partial.committed = true;
        debug!(key, size, "object written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<BlobBody, BlobError> {
        let path = self.object_path(key)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BlobError::NotFound(key.to_owned()));
            }
            Err(e) => return Err(io_error(&e)),
        };
        Ok(BlobBody::from_stream(ReaderStream::new(file)))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.object_path(key)?;
        fs::try_exists(&path).await.map_err(|e| io_error(&e))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use vanish_blob::testing::run_blob_store_conformance_tests;

    use super::*;

    async fn store_in(dir: &tempfile::TempDir) -> FsBlobStore {
        let store = FsBlobStore::new(dir.path(), "uploads");
        store.ensure_namespace().await.unwrap();
        store
    }

    #[tokio::test]
    async fn conformance() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        run_blob_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn objects_live_under_namespace_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        store
            .put("abc123", BlobBody::from_bytes("data"), 4, "text/plain")
            .await
            .unwrap();
        let on_disk = std::fs::read(dir.path().join("uploads").join("abc123")).unwrap();
        assert_eq!(on_disk, b"data");
    }

    #[tokio::test]
    async fn rejected_upload_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let err = store
            .put("abc123", BlobBody::from_bytes("too many bytes"), 2, "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::SizeMismatch { .. }));

        let leftovers = std::fs::read_dir(store.dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn abandoned_upload_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let key = "0123456789abcdef0123456789abcdef";
        let stalled = futures::stream::iter([Ok::<_, io::Error>(Bytes::from_static(b"abc"))])
            .chain(futures::stream::pending());

        let put = store.put(key, BlobBody::from_stream(stalled), 10, "text/plain");
        let timed_out = tokio::time::timeout(Duration::from_millis(100), put).await;
        assert!(timed_out.is_err(), "upload should still be waiting for bytes");

        store.delete(key).await.unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
        assert!(!store.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn path_like_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        for key in ["../escape", "a/b", ".hidden", "", "a\\b"] {
            let err = store.get(key).await.unwrap_err();
            assert!(
                matches!(err, BlobError::InvalidKey(_)),
                "key {key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn ensure_namespace_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "nested");
        store.ensure_namespace().await.unwrap();
        store.ensure_namespace().await.unwrap();
        assert!(store.dir().is_dir());
        assert_eq!(store.namespace(), "nested");
    }
}
