use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use vanish_core::ObjectId;

use crate::error::{LifecycleError, StoreKind};
use crate::manager::{LifecycleManager, blob_call, metadata_call};

/// Which half of a binding failed to delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimStage {
    /// The payload delete failed; the binding was left intact.
    Blob,
    /// The payload is gone but the record delete failed.
    Metadata,
}

impl ReclaimStage {
    /// The store this stage talks to.
    pub fn store(self) -> StoreKind {
        match self {
            Self::Blob => StoreKind::Blob,
            Self::Metadata => StoreKind::Metadata,
        }
    }
}

/// One binding a pass could not reclaim. The next pass retries it.
#[derive(Debug, Clone, Serialize)]
pub struct ReclaimFailure {
    pub id: ObjectId,
    pub stage: ReclaimStage,
    pub error: String,
}

/// Outcome of one reclamation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReclaimReport {
    /// Expired bindings examined.
    pub scanned: usize,
    /// Bindings whose payload and record were both removed by this pass.
    pub reclaimed: usize,
    /// Bindings left for a later pass.
    pub failures: Vec<ReclaimFailure>,
}

impl LifecycleManager {
    /// Remove every binding whose deadline is strictly before `now`.
    ///
    /// Each binding is handled independently: its payload is deleted first,
    /// then its record. A failure on one binding is recorded in the report
    /// and never stops the rest. Only a failure of the first expiry query
    /// fails the whole pass.
    #[instrument(skip(self), fields(now = %now))]
    pub async fn reclaim_expired(&self, now: DateTime<Utc>) -> Result<ReclaimReport, LifecycleError> {
        let page_size = self.config.reclaim_page_size;
        let mut report = ReclaimReport::default();
        let mut cursor: Option<ObjectId> = None;

        loop {
            let page = metadata_call(
                self.config.store_timeout,
                self.metadata
                    .find_expired_before(now, cursor.as_ref(), page_size),
            )
            .await;
            let page = match page {
                Ok(page) => page,
                Err(e) if cursor.is_none() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, scanned = report.scanned, "expiry query failed mid-pass, stopping early");
                    break;
                }
            };
            if page.is_empty() {
                break;
            }

            report.scanned += page.len();
            // Collected first so the pass future stays Send.
            let pending: Vec<_> = page.iter().map(|b| self.reclaim_one(&b.id)).collect();
            let outcomes: Vec<_> = stream::iter(pending)
                .buffer_unordered(self.config.reclaim_concurrency)
                .collect()
                .await;

            for outcome in outcomes {
                match outcome {
                    Ok(true) => report.reclaimed += 1,
                    // Someone else removed the record first.
                    Ok(false) => {}
                    Err(failure) => report.failures.push(failure),
                }
            }

            if page.len() < page_size {
                break;
            }
            cursor = page.last().map(|b| b.id.clone());
        }

        if report.reclaimed > 0 || !report.failures.is_empty() {
            info!(
                scanned = report.scanned,
                reclaimed = report.reclaimed,
                failed = report.failures.len(),
                "reclamation pass finished"
            );
        } else {
            debug!(scanned = report.scanned, "reclamation pass found nothing to do");
        }
        Ok(report)
    }

    /// Delete one binding's payload, then its record.
    ///
    /// Returns whether this call removed the record.
    pub(crate) async fn reclaim_one(&self, id: &ObjectId) -> Result<bool, ReclaimFailure> {
        if let Err(e) = blob_call(self.config.store_timeout, self.blob.delete(id.as_str())).await {
            self.metrics.increment_reclaim_failures();
            warn!(object_id = %id, error = %e, "payload delete failed, binding kept for retry");
            return Err(ReclaimFailure {
                id: id.clone(),
                stage: ReclaimStage::Blob,
                error: e.to_string(),
            });
        }

        match metadata_call(self.config.store_timeout, self.metadata.delete_by_id(id)).await {
            Ok(removed) => {
                if removed {
                    self.metrics.increment_reclaimed();
                    debug!(object_id = %id, "binding reclaimed");
                }
                Ok(removed)
            }
            Err(e) => {
                self.metrics.increment_reclaim_failures();
                warn!(object_id = %id, error = %e, "record delete failed after payload delete, will retry");
                Err(ReclaimFailure {
                    id: id.clone(),
                    stage: ReclaimStage::Metadata,
                    error: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::TimeZone;
    use vanish_blob::{BlobBody, BlobStore};
    use vanish_blob_memory::MemoryBlobStore;
    use vanish_core::Binding;
    use vanish_metadata::MetadataStore;
    use vanish_metadata_memory::MemoryMetadataStore;

    use super::*;
    use crate::config::LifecycleConfig;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2031, 5, 1, 12, 0, 0).unwrap()
    }

    async fn seed(
        blob: &MemoryBlobStore,
        metadata: &MemoryMetadataStore,
        ttl_secs: u64,
    ) -> Binding {
        let binding = Binding::new(
            ObjectId::generate(),
            "f",
            "text/plain",
            1,
            start(),
            Duration::from_secs(ttl_secs),
        );
        blob.put(binding.id.as_str(), BlobBody::from_bytes("x"), 1, "text/plain")
            .await
            .unwrap();
        metadata.save(&binding).await.unwrap();
        binding
    }

    fn manager(
        blob: &Arc<MemoryBlobStore>,
        metadata: &Arc<MemoryMetadataStore>,
        page_size: usize,
    ) -> LifecycleManager {
        LifecycleManager::builder()
            .blob_store(blob.clone())
            .metadata_store(metadata.clone())
            .config(LifecycleConfig {
                reclaim_page_size: page_size,
                reclaim_concurrency: 3,
                ..LifecycleConfig::default()
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn reclaims_only_expired_bindings() {
        let blob = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        let expired = seed(&blob, &metadata, 10).await;
        let live = seed(&blob, &metadata, 1000).await;
        let mgr = manager(&blob, &metadata, 100);

        let report = mgr
            .reclaim_expired(start() + chrono::Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.reclaimed, 1);
        assert!(report.failures.is_empty());
        assert!(metadata.find_by_id(&expired.id).await.unwrap().is_none());
        assert!(!blob.exists(expired.id.as_str()).await.unwrap());
        assert!(metadata.find_by_id(&live.id).await.unwrap().is_some());
        assert!(blob.exists(live.id.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn deadline_equal_to_now_is_kept() {
        let blob = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        let b = seed(&blob, &metadata, 30).await;
        let mgr = manager(&blob, &metadata, 100);

        let report = mgr.reclaim_expired(b.expires_at).await.unwrap();
        assert_eq!(report.reclaimed, 0);
        assert_eq!(metadata.len(), 1);
    }

    #[tokio::test]
    async fn pages_through_many_bindings() {
        let blob = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        for _ in 0..11 {
            seed(&blob, &metadata, 1).await;
        }
        let mgr = manager(&blob, &metadata, 4);

        let report = mgr
            .reclaim_expired(start() + chrono::Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(report.scanned, 11);
        assert_eq!(report.reclaimed, 11);
        assert!(metadata.is_empty());
        assert!(blob.is_empty());
        assert_eq!(mgr.metrics().snapshot().reclaimed, 11);
    }

    #[tokio::test]
    async fn second_pass_reclaims_nothing() {
        let blob = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        seed(&blob, &metadata, 1).await;
        let mgr = manager(&blob, &metadata, 10);
        let now = start() + chrono::Duration::seconds(5);

        assert_eq!(mgr.reclaim_expired(now).await.unwrap().reclaimed, 1);
        let again = mgr.reclaim_expired(now).await.unwrap();
        assert_eq!(again.reclaimed, 0);
        assert_eq!(again.scanned, 0);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn pass_can_run_on_a_spawned_task() {
        let blob = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        for _ in 0..5 {
            seed(&blob, &metadata, 1).await;
        }
        let mgr = Arc::new(manager(&blob, &metadata, 2));
        let now = start() + chrono::Duration::seconds(5);
        assert_send(&mgr.reclaim_expired(now));

        let task = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move { mgr.reclaim_expired(now).await })
        };
        let report = task.await.unwrap().unwrap();
        assert_eq!(report.reclaimed, 5);
        assert!(blob.is_empty());
    }

    #[test]
    fn stage_maps_to_store() {
        assert_eq!(ReclaimStage::Blob.store(), StoreKind::Blob);
        assert_eq!(ReclaimStage::Metadata.store(), StoreKind::Metadata);
    }
}
