use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::SubsecRound;
use tracing::{debug, error, info, instrument, warn};
use vanish_blob::{BlobBody, BlobError, BlobStore};
use vanish_core::{Binding, ObjectId};
use vanish_metadata::{MetadataError, MetadataStore};

use crate::builder::LifecycleBuilder;
use crate::clock::Clock;
use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::metrics::LifecycleMetrics;

/// An upload request.
#[derive(Debug)]
pub struct NewObject {
    /// Payload stream.
    pub body: BlobBody,
    /// Exact payload length in bytes.
    pub size: u64,
    /// MIME type carried through to downloads.
    pub content_type: String,
    /// Uploader's filename.
    pub original_name: String,
    /// Requested TTL; `None` uses the configured default.
    pub ttl: Option<Duration>,
}

/// A binding together with an open stream over its payload.
#[derive(Debug)]
pub struct FetchedObject {
    pub binding: Binding,
    pub body: BlobBody,
}

/// Bound a blob store call by `limit`.
pub(crate) async fn blob_call<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, BlobError>>,
) -> Result<T, BlobError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(BlobError::Timeout(limit)))
}

/// Bound a metadata store call by `limit`.
pub(crate) async fn metadata_call<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, MetadataError>>,
) -> Result<T, MetadataError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(MetadataError::Timeout(limit)))
}

/// Owns the binding between object ids, payloads and deadlines.
///
/// Shared behind an `Arc` by request handlers and the [`Reaper`](crate::Reaper).
/// Holds no locks of its own: safety under concurrent create, fetch and
/// reclaim rests on random ids and idempotent deletes.
pub struct LifecycleManager {
    pub(crate) blob: Arc<dyn BlobStore>,
    pub(crate) metadata: Arc<dyn MetadataStore>,
    pub(crate) config: LifecycleConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metrics: Arc<LifecycleMetrics>,
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("namespace", &self.blob.namespace())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LifecycleManager {
    /// Start building a manager.
    pub fn builder() -> LifecycleBuilder {
        LifecycleBuilder::new()
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<LifecycleMetrics> {
        &self.metrics
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Namespace of the underlying blob store.
    pub fn namespace(&self) -> &str {
        self.blob.namespace()
    }

    /// Make sure the blob namespace exists. Call once at startup.
    pub async fn ensure_namespace(&self) -> Result<(), LifecycleError> {
        blob_call(self.config.store_timeout, self.blob.ensure_namespace()).await?;
        Ok(())
    }

    /// Store a payload and bind it to a fresh id and deadline.
    ///
    /// The payload is written first and the binding saved second. If the
    /// save fails, the payload is deleted again before the error is
    /// returned, so no id is ever handed out without a durable record.
    #[instrument(skip(self, request), fields(size = request.size))]
    pub async fn create(&self, request: NewObject) -> Result<Binding, LifecycleError> {
        let result = self.create_binding(request).await;
        match &result {
            Ok(binding) => {
                self.metrics.increment_created();
                info!(
                    object_id = %binding.id,
                    expires_at = %binding.expires_at,
                    size = binding.size,
                    "object created"
                );
            }
            Err(e) => {
                self.metrics.increment_create_failed();
                debug!(error = %e, "create failed");
            }
        }
        result
    }

    async fn create_binding(&self, request: NewObject) -> Result<Binding, LifecycleError> {
        let NewObject {
            body,
            size,
            content_type,
            original_name,
            ttl,
        } = request;

        // Microsecond precision survives every metadata backend unchanged.
        let created_at = self.clock.now().trunc_subsecs(6);
        let binding = Binding::new(
            ObjectId::generate(),
            original_name,
            content_type,
            size,
            created_at,
            self.config.ttl.resolve(ttl),
        );
        let key = binding.id.as_str();

        let put = blob_call(
            self.config.transfer_timeout,
            self.blob.put(key, body, size, &binding.content_type),
        )
        .await;
        if let Err(e) = put {
            warn!(object_id = %binding.id, error = %e, "payload upload failed");
            // A failed or timed-out put may still have left an object behind.
            if let Err(cleanup) = blob_call(self.config.store_timeout, self.blob.delete(key)).await
            {
                warn!(object_id = %binding.id, error = %cleanup, "cleanup after failed upload failed");
            }
            return Err(e.into());
        }

        match self.save_with_retry(&binding).await {
            Ok(()) => Ok(binding),
            Err(save_error) => Err(self.compensate(&binding, &save_error).await),
        }
    }

    async fn save_with_retry(&self, binding: &Binding) -> Result<(), MetadataError> {
        let mut attempt = 0u32;
        loop {
            let err = match metadata_call(self.config.store_timeout, self.metadata.save(binding))
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            // An earlier attempt with an unknown outcome may have landed.
            if attempt > 0 && matches!(err, MetadataError::Conflict(_)) {
                let stored = metadata_call(
                    self.config.store_timeout,
                    self.metadata.find_by_id(&binding.id),
                )
                .await;
                if matches!(&stored, Ok(Some(b)) if b == binding) {
                    return Ok(());
                }
                return Err(err);
            }

            if !err.is_retryable() || attempt >= self.config.metadata_save_retries {
                return Err(err);
            }

            let delay = self.config.retry.delay_for(attempt);
            warn!(
                object_id = %binding.id,
                attempt = attempt + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "binding save failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Undo the payload write after the binding could not be saved.
    async fn compensate(&self, binding: &Binding, save_error: &MetadataError) -> LifecycleError {
        let id = &binding.id;

        // A save that failed transiently may have committed anyway. Remove
        // the record before its payload so it never points at nothing.
        if save_error.is_retryable() {
            if let Err(cleanup_error) =
                metadata_call(self.config.store_timeout, self.metadata.delete_by_id(id)).await
            {
                // The record may still exist, so the payload it names must too.
                self.metrics.increment_orphaned();
                error!(
                    object_id = %id,
                    namespace = %self.blob.namespace(),
                    save_error = %save_error,
                    cleanup_error = %cleanup_error,
                    "binding state unknown after failed save, payload kept"
                );
                return LifecycleError::CompensationIncomplete {
                    id: id.clone(),
                    namespace: self.blob.namespace().to_owned(),
                    save_error: save_error.to_string(),
                    cleanup_error: cleanup_error.to_string(),
                };
            }
        }

        match blob_call(self.config.store_timeout, self.blob.delete(id.as_str())).await {
            Ok(()) => {
                self.metrics.increment_compensated();
                warn!(object_id = %id, error = %save_error, "binding save failed, payload removed");
                LifecycleError::metadata_unavailable(save_error)
            }
            Err(delete_error) => {
                self.metrics.increment_orphaned();
                error!(
                    object_id = %id,
                    namespace = %self.blob.namespace(),
                    save_error = %save_error,
                    delete_error = %delete_error,
                    "orphaned payload needs manual cleanup"
                );
                LifecycleError::OrphanCompensationFailed {
                    id: id.clone(),
                    namespace: self.blob.namespace().to_owned(),
                    save_error: save_error.to_string(),
                    delete_error: delete_error.to_string(),
                }
            }
        }
    }

    /// Open a binding's payload.
    ///
    /// A binding whose payload is missing is a [`LifecycleError::ConsistencyViolation`],
    /// unless a re-read shows the binding was reclaimed in the meantime.
    #[instrument(skip(self), fields(object_id = %id))]
    pub async fn fetch(&self, id: &ObjectId) -> Result<FetchedObject, LifecycleError> {
        let binding = self.live_binding(id).await?;

        match blob_call(self.config.transfer_timeout, self.blob.get(id.as_str())).await {
            Ok(body) => {
                self.metrics.increment_fetched();
                debug!("payload opened");
                Ok(FetchedObject { binding, body })
            }
            Err(BlobError::NotFound(_)) => Err(self.missing_payload(id).await),
            Err(e) => Err(LifecycleError::blob_unavailable(&e)),
        }
    }

    /// Look up a binding without touching its payload.
    pub async fn stat(&self, id: &ObjectId) -> Result<Binding, LifecycleError> {
        self.live_binding(id).await
    }

    async fn live_binding(&self, id: &ObjectId) -> Result<Binding, LifecycleError> {
        let found = metadata_call(self.config.store_timeout, self.metadata.find_by_id(id)).await?;
        match found {
            Some(binding)
                if self.config.enforce_expiry_on_read
                    && binding.is_expired_at(self.clock.now()) =>
            {
                debug!(object_id = %id, "binding expired, awaiting reclamation");
                self.metrics.increment_not_found();
                Err(LifecycleError::NotFound(id.clone()))
            }
            Some(binding) => Ok(binding),
            None => {
                self.metrics.increment_not_found();
                Err(LifecycleError::NotFound(id.clone()))
            }
        }
    }

    async fn missing_payload(&self, id: &ObjectId) -> LifecycleError {
        let reread = metadata_call(self.config.store_timeout, self.metadata.find_by_id(id)).await;
        match reread {
            // Reclaimed between the lookup and the read, or mid-reclamation.
            Ok(None) => {
                self.metrics.increment_not_found();
                LifecycleError::NotFound(id.clone())
            }
            Ok(Some(binding)) if binding.is_expired_at(self.clock.now()) => {
                self.metrics.increment_not_found();
                LifecycleError::NotFound(id.clone())
            }
            Ok(Some(_)) => {
                self.metrics.increment_consistency_violations();
                error!(
                    object_id = %id,
                    namespace = %self.blob.namespace(),
                    "binding present but payload missing"
                );
                LifecycleError::ConsistencyViolation {
                    id: id.clone(),
                    detail: format!("payload missing from {}", self.blob.namespace()),
                }
            }
            Err(e) => e.into(),
        }
    }

    /// Remove one binding now, ignoring its deadline.
    ///
    /// Runs the same blob-then-metadata deletion as reclamation. The stored
    /// deadline is left as it was.
    #[instrument(skip(self), fields(object_id = %id))]
    pub async fn expire_now(&self, id: &ObjectId) -> Result<(), LifecycleError> {
        let found = metadata_call(self.config.store_timeout, self.metadata.find_by_id(id)).await?;
        if found.is_none() {
            self.metrics.increment_not_found();
            return Err(LifecycleError::NotFound(id.clone()));
        }

        match self.reclaim_one(id).await {
            Ok(_) => {
                info!("object expired on request");
                Ok(())
            }
            Err(failure) => Err(LifecycleError::StoreUnavailable {
                store: failure.stage.store(),
                detail: failure.error,
            }),
        }
    }
}
