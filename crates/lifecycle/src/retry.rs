use std::time::Duration;

/// Pause between attempts of a binding save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Starts at `base` and doubles on every attempt, never exceeding `max`.
    Exponential {
        /// Pause before the first retry.
        base: Duration,
        /// Ceiling for every pause.
        max: Duration,
    },
    /// The same pause before every retry.
    Constant {
        /// The pause.
        delay: Duration,
    },
}

impl RetryStrategy {
    /// Pause before retry number `attempt`, counting from zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use vanish_lifecycle::RetryStrategy;
    ///
    /// let strategy = RetryStrategy::Exponential {
    ///     base: Duration::from_millis(50),
    ///     max: Duration::from_millis(150),
    /// };
    /// assert_eq!(strategy.delay_for(0), Duration::from_millis(50));
    /// assert_eq!(strategy.delay_for(1), Duration::from_millis(100));
    /// assert_eq!(strategy.delay_for(2), Duration::from_millis(150));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::Exponential { base, max } => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(max)
            }
            Self::Constant { delay } => delay,
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_up_to_the_ceiling() {
        let strategy = RetryStrategy::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_millis(500),
        };
        let delays: Vec<_> = (0..5).map(|a| strategy.delay_for(a).as_millis()).collect();
        assert_eq!(delays, [100, 200, 400, 500, 500]);
    }

    #[test]
    fn huge_attempt_counts_saturate() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.delay_for(31), Duration::from_secs(2));
        assert_eq!(strategy.delay_for(32), Duration::from_secs(2));
        assert_eq!(strategy.delay_for(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn constant_ignores_attempt() {
        let strategy = RetryStrategy::Constant {
            delay: Duration::from_millis(75),
        };
        assert_eq!(strategy.delay_for(0), strategy.delay_for(9));
    }
}
