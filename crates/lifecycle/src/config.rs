use std::time::Duration;

use crate::error::LifecycleError;
use crate::retry::RetryStrategy;

/// Bounds on caller-requested time-to-live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Shortest TTL a binding may get.
    pub min: Duration,
    /// Longest TTL a binding may get.
    pub max: Duration,
    /// TTL used when the caller does not ask for one.
    pub default: Duration,
}

impl TtlPolicy {
    /// Check `0 < min <= default <= max`.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.min.is_zero() {
            return Err(LifecycleError::Configuration(
                "minimum TTL must be positive".into(),
            ));
        }
        if self.min > self.max {
            return Err(LifecycleError::Configuration(format!(
                "minimum TTL {:?} exceeds maximum {:?}",
                self.min, self.max
            )));
        }
        if self.default < self.min || self.default > self.max {
            return Err(LifecycleError::Configuration(format!(
                "default TTL {:?} outside [{:?}, {:?}]",
                self.default, self.min, self.max
            )));
        }
        Ok(())
    }

    /// Resolve a requested TTL: the default when absent, clamped otherwise.
    pub fn resolve(&self, requested: Option<Duration>) -> Duration {
        requested.map_or(self.default, |ttl| ttl.clamp(self.min, self.max))
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(7 * 24 * 60 * 60),
            default: Duration::from_secs(60 * 60),
        }
    }
}

/// Immutable settings for a [`LifecycleManager`](crate::LifecycleManager).
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// TTL bounds.
    pub ttl: TtlPolicy,
    /// Bound on each metadata call and on blob deletes and probes.
    pub store_timeout: Duration,
    /// Bound on a blob upload and on opening a blob download.
    pub transfer_timeout: Duration,
    /// Report expired-but-not-yet-reclaimed bindings as not found.
    pub enforce_expiry_on_read: bool,
    /// Extra attempts for a retryable metadata save during create.
    pub metadata_save_retries: u32,
    /// Backoff between metadata save attempts.
    pub retry: RetryStrategy,
    /// Bindings fetched per expiry query.
    pub reclaim_page_size: usize,
    /// Bindings reclaimed concurrently within a page.
    pub reclaim_concurrency: usize,
}

impl LifecycleConfig {
    /// Reject settings the manager cannot run with.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        self.ttl.validate()?;
        if self.store_timeout.is_zero() || self.transfer_timeout.is_zero() {
            return Err(LifecycleError::Configuration(
                "store timeouts must be positive".into(),
            ));
        }
        if self.reclaim_page_size == 0 {
            return Err(LifecycleError::Configuration(
                "reclaim page size must be positive".into(),
            ));
        }
        if self.reclaim_concurrency == 0 {
            return Err(LifecycleError::Configuration(
                "reclaim concurrency must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ttl: TtlPolicy::default(),
            store_timeout: Duration::from_secs(10),
            transfer_timeout: Duration::from_secs(300),
            enforce_expiry_on_read: true,
            metadata_save_retries: 2,
            retry: RetryStrategy::default(),
            reclaim_page_size: 256,
            reclaim_concurrency: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn default_policy_is_valid() {
        TtlPolicy::default().validate().unwrap();
        LifecycleConfig::default().validate().unwrap();
        assert_eq!(TtlPolicy::default().default, secs(3600));
    }

    #[test]
    fn resolve_clamps_and_defaults() {
        let policy = TtlPolicy {
            min: secs(10),
            max: secs(100),
            default: secs(50),
        };
        assert_eq!(policy.resolve(None), secs(50));
        assert_eq!(policy.resolve(Some(secs(1))), secs(10));
        assert_eq!(policy.resolve(Some(Duration::ZERO)), secs(10));
        assert_eq!(policy.resolve(Some(secs(70))), secs(70));
        assert_eq!(policy.resolve(Some(secs(10_000))), secs(100));
    }

    #[test]
    fn invalid_policies_are_rejected() {
        let zero_min = TtlPolicy {
            min: Duration::ZERO,
            ..TtlPolicy::default()
        };
        assert!(zero_min.validate().is_err());

        let inverted = TtlPolicy {
            min: secs(100),
            max: secs(10),
            default: secs(50),
        };
        assert!(inverted.validate().is_err());

        let default_out_of_range = TtlPolicy {
            min: secs(10),
            max: secs(100),
            default: secs(500),
        };
        assert!(default_out_of_range.validate().is_err());
    }

    #[test]
    fn zero_page_size_or_concurrency_is_rejected() {
        let config = LifecycleConfig {
            reclaim_page_size: 0,
            ..LifecycleConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LifecycleError::Configuration(_))
        ));

        let config = LifecycleConfig {
            reclaim_concurrency: 0,
            ..LifecycleConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
