use std::time::Duration;

use serde::Deserialize;
use vanish_lifecycle::{LifecycleConfig, ReaperConfig, RetryStrategy, TtlPolicy};

/// TTL policy, store timeouts and reclamation tuning.
///
/// # Example
///
/// ```toml
/// [lifecycle]
/// default_ttl_seconds = 3600
/// max_ttl_seconds = 86400
/// store_timeout_seconds = 5
/// ```
#[derive(Debug, Deserialize)]
pub struct LifecycleServerConfig {
    /// TTL applied when an upload does not ask for one.
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: u64,
    /// Shortest TTL an upload may ask for.
    #[serde(default = "default_min_ttl")]
    pub min_ttl_seconds: u64,
    /// Longest TTL an upload may ask for.
    #[serde(default = "default_max_ttl")]
    pub max_ttl_seconds: u64,
    /// Bound on every metadata call and blob delete.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_seconds: u64,
    /// Bound on a blob upload or download open.
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_seconds: u64,
    /// Hide expired bindings that the reaper has not removed yet.
    #[serde(default = "default_true")]
    pub enforce_expiry_on_read: bool,
    /// Retries of a transiently failing metadata save during upload.
    #[serde(default = "default_save_retries")]
    pub metadata_save_retries: u32,
    /// Delay before the first save retry, doubling up to `retry_max_delay_ms`.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
    /// Expired bindings read per expiry query.
    #[serde(default = "default_page_size")]
    pub reclaim_page_size: usize,
    /// Bindings reclaimed concurrently within a page.
    #[serde(default = "default_concurrency")]
    pub reclaim_concurrency: usize,
}

impl Default for LifecycleServerConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_ttl(),
            min_ttl_seconds: default_min_ttl(),
            max_ttl_seconds: default_max_ttl(),
            store_timeout_seconds: default_store_timeout(),
            transfer_timeout_seconds: default_transfer_timeout(),
            enforce_expiry_on_read: true,
            metadata_save_retries: default_save_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            reclaim_page_size: default_page_size(),
            reclaim_concurrency: default_concurrency(),
        }
    }
}

impl LifecycleServerConfig {
    /// Convert to the manager's configuration. Validation happens when the
    /// manager is built.
    pub fn to_lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            ttl: TtlPolicy {
                min: Duration::from_secs(self.min_ttl_seconds),
                max: Duration::from_secs(self.max_ttl_seconds),
                default: Duration::from_secs(self.default_ttl_seconds),
            },
            store_timeout: Duration::from_secs(self.store_timeout_seconds),
            transfer_timeout: Duration::from_secs(self.transfer_timeout_seconds),
            enforce_expiry_on_read: self.enforce_expiry_on_read,
            metadata_save_retries: self.metadata_save_retries,
            retry: RetryStrategy::Exponential {
                base: Duration::from_millis(self.retry_base_delay_ms),
                max: Duration::from_millis(self.retry_max_delay_ms),
            },
            reclaim_page_size: self.reclaim_page_size,
            reclaim_concurrency: self.reclaim_concurrency,
        }
    }
}

fn default_ttl() -> u64 {
    60 * 60
}

fn default_min_ttl() -> u64 {
    1
}

fn default_max_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_store_timeout() -> u64 {
    10
}

fn default_transfer_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_save_retries() -> u32 {
    2
}

fn default_retry_base_delay() -> u64 {
    100
}

fn default_retry_max_delay() -> u64 {
    2_000
}

fn default_page_size() -> usize {
    256
}

fn default_concurrency() -> usize {
    8
}

/// Reaper schedule.
#[derive(Debug, Deserialize)]
pub struct ReaperServerConfig {
    /// Seconds between reclamation passes.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Run a pass as soon as the server starts.
    #[serde(default)]
    pub run_on_start: bool,
}

impl Default for ReaperServerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            run_on_start: false,
        }
    }
}

impl ReaperServerConfig {
    pub fn to_reaper_config(&self) -> ReaperConfig {
        ReaperConfig {
            // A zero period would panic inside the interval timer.
            interval: Duration::from_secs(self.interval_seconds.max(1)),
            run_on_start: self.run_on_start,
        }
    }
}

fn default_interval() -> u64 {
    60
}
