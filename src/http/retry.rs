//! Backoff policy for transient failures.

use async_trait::async_trait;
use std::time::Duration;

/// Default number of attempts for a single API call.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
pub const BASE_DELAY_MS: u64 = 1000;

/// Upper bound for a single backoff delay in milliseconds.
pub const MAX_DELAY_MS: u64 = 10_000;

/// How many times a call is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts per call. 0 and 1 both mean a single attempt.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_attempts(DEFAULT_RETRY_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// The standard backoff (1s base, 10s cap) with the given attempt budget.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
        }
    }

    /// Number of HTTP attempts a call may make.
    pub fn total_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Whether failures are retried at all.
    pub fn retries_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Delay before the next attempt, given how many attempts have failed.
    ///
    /// `base * 2^failed`, capped at `max_delay`.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(failed_attempts.min(20));
        let delay = self.base_delay.saturating_mul(multiplier);
        delay.min(self.max_delay)
    }
}

/// Suspends the current task between attempts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_delay_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for(30), Duration::from_millis(10_000));
    }

    #[test]
    fn test_delays_non_decreasing() {
        let policy = RetryPolicy::with_attempts(50);
        let delays: Vec<_> = (0..50).map(|n| policy.delay_for(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= policy.max_delay));
    }

    #[test]
    fn test_total_attempts() {
        assert_eq!(RetryPolicy::with_attempts(0).total_attempts(), 1);
        assert_eq!(RetryPolicy::with_attempts(1).total_attempts(), 1);
        assert_eq!(RetryPolicy::with_attempts(3).total_attempts(), 3);
        assert!(!RetryPolicy::with_attempts(1).retries_enabled());
        assert!(RetryPolicy::with_attempts(2).retries_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_uses_timer() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
