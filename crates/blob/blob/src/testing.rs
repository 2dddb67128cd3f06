use bytes::Bytes;

use crate::body::BlobBody;
use crate::error::BlobError;
use crate::store::BlobStore;

/// Run the full blob store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if a store call fails unexpectedly. Assertion failures
/// panic.
pub async fn run_blob_store_conformance_tests(store: &dyn BlobStore) -> Result<(), BlobError> {
    test_put_and_get(store).await?;
    test_get_missing(store).await?;
    test_exists(store).await?;
    test_delete_is_idempotent(store).await?;
    test_size_mismatch_leaves_nothing(store).await?;
    test_chunked_put(store).await?;
    test_empty_object(store).await?;
    Ok(())
}

async fn test_put_and_get(store: &dyn BlobStore) -> Result<(), BlobError> {
    let key = "conformance0000000000000000000001";
    store
        .put(key, BlobBody::from_bytes("hello blob"), 10, "text/plain")
        .await?;
    let data = store
        .get(key)
        .await?
        .collect()
        .await
        .map_err(|e| BlobError::Backend(e.to_string()))?;
    assert_eq!(data, Bytes::from_static(b"hello blob"));
    Ok(())
}

async fn test_get_missing(store: &dyn BlobStore) -> Result<(), BlobError> {
    let result = store.get("conformance0000000000000000000002").await;
    assert!(
        matches!(result, Err(BlobError::NotFound(_))),
        "get on missing key should return NotFound"
    );
    Ok(())
}

async fn test_exists(store: &dyn BlobStore) -> Result<(), BlobError> {
    let key = "conformance0000000000000000000003";
    assert!(!store.exists(key).await?, "missing key should not exist");
    store
        .put(key, BlobBody::from_bytes("x"), 1, "text/plain")
        .await?;
    assert!(store.exists(key).await?, "stored key should exist");
    Ok(())
}

async fn test_delete_is_idempotent(store: &dyn BlobStore) -> Result<(), BlobError> {
    let key = "conformance0000000000000000000004";
    store
        .put(key, BlobBody::from_bytes("bye"), 3, "text/plain")
        .await?;
    store.delete(key).await?;
    assert!(!store.exists(key).await?, "deleted key should be absent");

    // Second delete of the same key must succeed.
    store.delete(key).await?;
    // So must a delete of a key that never existed.
    store.delete("conformance0000000000000000000005").await?;
    Ok(())
}

async fn test_size_mismatch_leaves_nothing(store: &dyn BlobStore) -> Result<(), BlobError> {
    let key = "conformance0000000000000000000006";
    let result = store
        .put(key, BlobBody::from_bytes("too long"), 3, "text/plain")
        .await;
    assert!(
        matches!(result, Err(BlobError::SizeMismatch { .. })),
        "oversized body should be rejected"
    );
    assert!(
        !store.exists(key).await?,
        "rejected put should leave no object"
    );

    let result = store
        .put(key, BlobBody::from_bytes("short"), 50, "text/plain")
        .await;
    assert!(
        matches!(result, Err(BlobError::SizeMismatch { .. })),
        "undersized body should be rejected"
    );
    assert!(
        !store.exists(key).await?,
        "rejected put should leave no object"
    );
    Ok(())
}

async fn test_chunked_put(store: &dyn BlobStore) -> Result<(), BlobError> {
    let key = "conformance0000000000000000000007";
    let chunks: Vec<std::io::Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"one,")),
        Ok(Bytes::from_static(b"two,")),
        Ok(Bytes::from_static(b"three")),
    ];
    store
        .put(
            key,
            BlobBody::from_stream(futures::stream::iter(chunks)),
            13,
            "text/csv",
        )
        .await?;
    let data = store
        .get(key)
        .await?
        .collect()
        .await
        .map_err(|e| BlobError::Backend(e.to_string()))?;
    assert_eq!(&data[..], b"one,two,three");
    Ok(())
}

async fn test_empty_object(store: &dyn BlobStore) -> Result<(), BlobError> {
    let key = "conformance0000000000000000000008";
    store
        .put(key, BlobBody::empty(), 0, "application/octet-stream")
        .await?;
    assert!(store.exists(key).await?);
    let data = store
        .get(key)
        .await?
        .collect()
        .await
        .map_err(|e| BlobError::Backend(e.to_string()))?;
    assert!(data.is_empty());
    Ok(())
}
