use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::error::LifecycleError;
use crate::manager::LifecycleManager;
use crate::reclaim::ReclaimReport;

/// Schedule for the [`Reaper`].
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Time between passes.
    pub interval: Duration,
    /// Run a pass immediately when the reaper starts.
    pub run_on_start: bool,
}

impl ReaperConfig {
    /// Reject schedules the interval timer cannot run.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.interval.is_zero() {
            return Err(LifecycleError::Configuration(
                "reaper interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            run_on_start: false,
        }
    }
}

/// Result of asking the reaper for a pass.
#[derive(Debug)]
pub enum PassOutcome {
    /// The pass ran.
    Completed(ReclaimReport),
    /// Another pass was still running, so this one did not start.
    Skipped,
    /// The expiry query failed; nothing was reclaimed.
    Failed(LifecycleError),
}

/// Clears the in-progress flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Recurring, non-overlapping driver of [`LifecycleManager::reclaim_expired`].
///
/// At most one pass runs at a time, whether started by the timer or on
/// demand. A request that arrives while a pass is running is skipped, not
/// queued.
pub struct Reaper {
    manager: Arc<LifecycleManager>,
    config: ReaperConfig,
    in_progress: AtomicBool,
}

impl std::fmt::Debug for Reaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaper")
            .field("config", &self.config)
            .field("in_progress", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Reaper {
    /// Create a reaper that is not yet running; see [`spawn`](Self::spawn).
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Configuration`] if `config` is invalid.
    pub fn new(manager: Arc<LifecycleManager>, config: ReaperConfig) -> Result<Self, LifecycleError> {
        config.validate()?;
        Ok(Self {
            manager,
            config,
            in_progress: AtomicBool::new(false),
        })
    }

    pub fn manager(&self) -> &Arc<LifecycleManager> {
        &self.manager
    }

    /// Whether a pass is running right now.
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Run one pass reclaiming bindings that expired before `now`, unless a
    /// pass is already running.
    pub async fn try_run_pass(&self, now: DateTime<Utc>) -> PassOutcome {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.manager.metrics().increment_passes_skipped();
            debug!("reclamation pass already running, skipping");
            return PassOutcome::Skipped;
        }
        let _guard = PassGuard(&self.in_progress);

        match self.manager.reclaim_expired(now).await {
            Ok(report) => {
                self.manager.metrics().increment_passes_completed();
                PassOutcome::Completed(report)
            }
            Err(e) => {
                error!(error = %e, "reclamation pass failed");
                PassOutcome::Failed(e)
            }
        }
    }

    /// Run one pass at the manager's current time.
    pub async fn run_pass(&self) -> PassOutcome {
        let now = self.manager.clock().now();
        self.try_run_pass(now).await
    }

    /// Start the recurring task.
    pub fn spawn(self: Arc<Self>) -> ReaperHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move { self.run(shutdown_rx, trigger_rx).await });
        ReaperHandle {
            shutdown_tx,
            trigger_tx,
            task,
        }
    }

    async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>, mut trigger_rx: mpsc::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            namespace = %self.manager.namespace(),
            "reaper starting"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !self.config.run_on_start {
            // The first tick completes immediately.
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("reaper received shutdown signal");
                    break;
                }
                Some(()) = trigger_rx.recv() => {
                    debug!("reclamation pass requested");
                    self.run_pass().await;
                }
                _ = ticker.tick() => {
                    self.run_pass().await;
                }
            }
        }

        info!("reaper stopped");
    }
}

/// Control handle for a spawned [`Reaper`].
#[derive(Debug)]
pub struct ReaperHandle {
    shutdown_tx: mpsc::Sender<()>,
    trigger_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Ask for a pass as soon as possible.
    ///
    /// Returns `false` if a request is already pending.
    pub fn trigger(&self) -> bool {
        self.trigger_tx.try_send(()).is_ok()
    }

    /// Stop the task, letting a running pass finish first.
    pub async fn shutdown(self) {
        // A closed channel means the task already ended.
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "reaper task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::TimeZone;
    use vanish_blob::BlobBody;
    use vanish_blob_memory::MemoryBlobStore;
    use vanish_metadata_memory::MemoryMetadataStore;

    use super::*;
    use crate::clock::ManualClock;
    use crate::manager::NewObject;

    struct Fixture {
        manager: Arc<LifecycleManager>,
        blob: Arc<MemoryBlobStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let blob = Arc::new(MemoryBlobStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2031, 5, 1, 12, 0, 0).unwrap(),
        ));
        let manager = LifecycleManager::builder()
            .blob_store(blob.clone())
            .metadata_store(Arc::new(MemoryMetadataStore::new()))
            .clock(clock.clone())
            .build()
            .unwrap();
        Fixture {
            manager: Arc::new(manager),
            blob,
            clock,
        }
    }

    async fn create_short_lived(manager: &LifecycleManager) {
        manager
            .create(NewObject {
                body: BlobBody::from_bytes(Bytes::from_static(b"tmp")),
                size: 3,
                content_type: "text/plain".into(),
                original_name: "tmp.txt".into(),
                ttl: Some(Duration::from_secs(1)),
            })
            .await
            .unwrap();
    }

    #[test]
    fn zero_interval_is_rejected() {
        let f = fixture();
        let err = Reaper::new(
            f.manager.clone(),
            ReaperConfig {
                interval: Duration::ZERO,
                run_on_start: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Configuration(_)));
        assert!(ReaperConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn pass_is_skipped_while_another_runs() {
        let f = fixture();
        let reaper = Reaper::new(f.manager.clone(), ReaperConfig::default()).unwrap();

        reaper.in_progress.store(true, Ordering::Release);
        assert!(matches!(reaper.run_pass().await, PassOutcome::Skipped));
        assert_eq!(f.manager.metrics().snapshot().passes_skipped, 1);

        reaper.in_progress.store(false, Ordering::Release);
        assert!(matches!(reaper.run_pass().await, PassOutcome::Completed(_)));
        assert!(!reaper.is_running(), "guard released after the pass");
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_reaper_reclaims_on_interval() {
        let f = fixture();
        create_short_lived(&f.manager).await;
        f.clock.advance(chrono::Duration::seconds(2));

        let config = ReaperConfig {
            interval: Duration::from_secs(60),
            run_on_start: false,
        };
        let reaper = Arc::new(Reaper::new(f.manager.clone(), config).unwrap());
        let handle = reaper.spawn();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.blob.len(), 1, "no pass before the first interval");

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(f.blob.is_empty());
        assert_eq!(f.manager.metrics().snapshot().passes_completed, 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn run_on_start_and_trigger() {
        let f = fixture();
        let config = ReaperConfig {
            interval: Duration::from_secs(3600),
            run_on_start: true,
        };
        let reaper = Arc::new(Reaper::new(f.manager.clone(), config).unwrap());
        let handle = reaper.spawn();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.manager.metrics().snapshot().passes_completed, 1);

        create_short_lived(&f.manager).await;
        f.clock.advance(chrono::Duration::seconds(5));
        assert!(handle.trigger());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(f.blob.is_empty());
        assert_eq!(f.manager.metrics().snapshot().passes_completed, 2);

        handle.shutdown().await;
    }
}
