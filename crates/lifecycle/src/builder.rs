use std::sync::Arc;

use vanish_blob::BlobStore;
use vanish_metadata::MetadataStore;

use crate::clock::{Clock, SystemClock};
use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::manager::LifecycleManager;
use crate::metrics::LifecycleMetrics;

/// Fluent builder for a [`LifecycleManager`].
///
/// Both stores are required. Everything else defaults: the default
/// [`LifecycleConfig`], the system clock and a fresh metrics registry.
pub struct LifecycleBuilder {
    blob: Option<Arc<dyn BlobStore>>,
    metadata: Option<Arc<dyn MetadataStore>>,
    config: LifecycleConfig,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<LifecycleMetrics>>,
}

impl LifecycleBuilder {
    pub fn new() -> Self {
        Self {
            blob: None,
            metadata: None,
            config: LifecycleConfig::default(),
            clock: Arc::new(SystemClock),
            metrics: None,
        }
    }

    /// Set the payload store.
    #[must_use]
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob = Some(store);
        self
    }

    /// Set the binding record store.
    #[must_use]
    pub fn metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(store);
        self
    }

    #[must_use]
    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share an existing metrics registry.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<LifecycleMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and build the manager.
    ///
    /// Returns [`LifecycleError::Configuration`] if a store is missing or
    /// the configuration is invalid.
    pub fn build(self) -> Result<LifecycleManager, LifecycleError> {
        let blob = self
            .blob
            .ok_or_else(|| LifecycleError::Configuration("blob store is required".into()))?;
        let metadata = self
            .metadata
            .ok_or_else(|| LifecycleError::Configuration("metadata store is required".into()))?;
        self.config.validate()?;

        Ok(LifecycleManager {
            blob,
            metadata,
            config: self.config,
            clock: self.clock,
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}

impl Default for LifecycleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use vanish_blob_memory::MemoryBlobStore;
    use vanish_metadata_memory::MemoryMetadataStore;

    use super::*;
    use crate::config::TtlPolicy;

    #[test]
    fn missing_stores_are_rejected() {
        let err = LifecycleBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("blob store is required"));

        let err = LifecycleBuilder::new()
            .blob_store(Arc::new(MemoryBlobStore::new()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("metadata store is required"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = LifecycleBuilder::new()
            .blob_store(Arc::new(MemoryBlobStore::new()))
            .metadata_store(Arc::new(MemoryMetadataStore::new()))
            .config(LifecycleConfig {
                ttl: TtlPolicy {
                    min: Duration::from_secs(10),
                    max: Duration::from_secs(5),
                    default: Duration::from_secs(7),
                },
                ..LifecycleConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Configuration(_)));
    }

    #[test]
    fn shared_metrics_are_used() {
        let metrics = Arc::new(LifecycleMetrics::default());
        let manager = LifecycleBuilder::new()
            .blob_store(Arc::new(MemoryBlobStore::with_namespace("bucket-a")))
            .metadata_store(Arc::new(MemoryMetadataStore::new()))
            .metrics(Arc::clone(&metrics))
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(manager.metrics(), &metrics));
        assert_eq!(manager.namespace(), "bucket-a");
    }
}
