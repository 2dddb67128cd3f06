use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters tracking lifecycle outcomes.
///
/// All counters use relaxed ordering. For a consistent point-in-time view,
/// call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    /// Bindings created.
    pub created: AtomicU64,
    /// Create calls that returned an error.
    pub create_failed: AtomicU64,
    /// Uploaded payloads removed after their binding could not be saved.
    pub compensated: AtomicU64,
    /// Payloads left behind because compensation failed.
    pub orphaned: AtomicU64,
    /// Successful fetches.
    pub fetched: AtomicU64,
    /// Lookups that found no binding.
    pub not_found: AtomicU64,
    /// Bindings found without their payload.
    pub consistency_violations: AtomicU64,
    /// Bindings fully removed by reclamation or explicit expiry.
    pub reclaimed: AtomicU64,
    /// Per-binding reclamation failures.
    pub reclaim_failures: AtomicU64,
    /// Reaper passes that ran to completion.
    pub passes_completed: AtomicU64,
    /// Reaper passes skipped because another was running.
    pub passes_skipped: AtomicU64,
}

impl LifecycleMetrics {
    pub fn increment_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_create_failed(&self) {
        self.create_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_compensated(&self) {
        self.compensated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_orphaned(&self) {
        self.orphaned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_consistency_violations(&self) {
        self.consistency_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reclaimed(&self) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reclaim_failures(&self) {
        self.reclaim_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_passes_completed(&self) {
        self.passes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_passes_skipped(&self) {
        self.passes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            create_failed: self.create_failed.load(Ordering::Relaxed),
            compensated: self.compensated.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            consistency_violations: self.consistency_violations.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            reclaim_failures: self.reclaim_failures.load(Ordering::Relaxed),
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            passes_skipped: self.passes_skipped.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`LifecycleMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub created: u64,
    pub create_failed: u64,
    pub compensated: u64,
    pub orphaned: u64,
    pub fetched: u64,
    pub not_found: u64,
    pub consistency_violations: u64,
    pub reclaimed: u64,
    pub reclaim_failures: u64,
    pub passes_completed: u64,
    pub passes_skipped: u64,
}
