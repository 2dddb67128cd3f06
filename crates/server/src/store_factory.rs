use std::sync::Arc;

use vanish_blob::BlobStore;
use vanish_blob_fs::FsBlobStore;
use vanish_blob_memory::MemoryBlobStore;
#[cfg(feature = "s3")]
use vanish_blob_s3::{S3BlobConfig, S3BlobStore};
use vanish_metadata::MetadataStore;
use vanish_metadata_memory::MemoryMetadataStore;
#[cfg(feature = "postgres")]
use vanish_metadata_postgres::{PostgresConfig, PostgresMetadataStore};

use crate::config::{BlobConfig, MetadataConfig};
use crate::error::ServerError;

/// Create the payload store from the given configuration.
#[allow(clippy::unused_async)]
pub async fn create_blob_store(config: &BlobConfig) -> Result<Arc<dyn BlobStore>, ServerError> {
    let store: Arc<dyn BlobStore> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryBlobStore::with_namespace(&config.namespace)),
        "fs" => Arc::new(FsBlobStore::new(&config.path, &config.namespace)),
        #[cfg(feature = "s3")]
        "s3" => {
            let mut s3_config = S3BlobConfig::new(&config.namespace);
            if let Some(region) = &config.region {
                s3_config = s3_config.with_region(region);
            }
            if let Some(endpoint) = &config.endpoint_url {
                s3_config = s3_config.with_endpoint_url(endpoint);
            }
            if let Some(prefix) = &config.prefix {
                s3_config = s3_config.with_prefix(prefix);
            }
            if let Some(role_arn) = &config.role_arn {
                s3_config = s3_config.with_role_arn(role_arn);
            }
            Arc::new(S3BlobStore::new(s3_config).await)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unsupported blob backend: {other} (is the cargo feature enabled?)"
            )));
        }
    };

    tracing::info!(backend = %config.backend, namespace = %config.namespace, "blob store initialized");
    Ok(store)
}

/// Create the binding record store from the given configuration.
///
/// SQL backends run their migrations here.
#[allow(clippy::unused_async)]
pub async fn create_metadata_store(
    config: &MetadataConfig,
) -> Result<Arc<dyn MetadataStore>, ServerError> {
    let store: Arc<dyn MetadataStore> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryMetadataStore::new()),
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config.url.as_deref().ok_or_else(|| {
                ServerError::Config("postgres metadata backend requires [metadata] url".into())
            })?;

            let mut pg_config = PostgresConfig {
                url: url.to_owned(),
                ssl_mode: config.ssl_mode.clone(),
                ssl_root_cert: config.ssl_root_cert.clone(),
                ..PostgresConfig::default()
            };
            if let Some(pool_size) = config.pool_size {
                pg_config.pool_size = pool_size;
            }
            if let Some(schema) = &config.schema {
                pg_config.schema.clone_from(schema);
            }
            if let Some(prefix) = &config.table_prefix {
                pg_config.table_prefix.clone_from(prefix);
            }

            let store = PostgresMetadataStore::new(pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("metadata postgres: {e}")))?;
            Arc::new(store)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unsupported metadata backend: {other} (is the cargo feature enabled?)"
            )));
        }
    };

    tracing::info!(backend = %config.backend, "metadata store initialized");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backends_are_built_by_default() {
        let blob = create_blob_store(&BlobConfig::default()).await.unwrap();
        assert_eq!(blob.namespace(), "vanish");
        create_metadata_store(&MetadataConfig::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_backends_are_rejected() {
        let blob = BlobConfig {
            backend: "tape".into(),
            ..BlobConfig::default()
        };
        let err = create_blob_store(&blob).await.err().unwrap();
        assert!(err.to_string().contains("unsupported blob backend: tape"));

        let metadata = MetadataConfig {
            backend: "ledger".into(),
            ..MetadataConfig::default()
        };
        let err = create_metadata_store(&metadata).await.err().unwrap();
        assert!(err.to_string().contains("unsupported metadata backend"));
    }

    #[tokio::test]
    async fn fs_backend_uses_configured_path() {
        let blob = BlobConfig {
            backend: "fs".into(),
            namespace: "scratch".into(),
            path: std::env::temp_dir().display().to_string(),
            ..BlobConfig::default()
        };
        let store = create_blob_store(&blob).await.unwrap();
        assert_eq!(store.namespace(), "scratch");
    }
}
