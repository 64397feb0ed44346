//! Retry policy for background refresh tasks.
//!
//! A task runs up to `max_attempts` times. Before each retry the worker
//! waits the next entry of `backoff`; once the list runs out its last
//! entry repeats.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use skycache_core::WorkerConfig;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_SECS: [u64; 3] = [10, 30, 60];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the 1st, 2nd, ... retry
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            config.max_attempts,
            config
                .backoff_seconds
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        )
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let index = (retry as usize).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(index).copied().unwrap_or(Duration::ZERO)
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// Returns the last error once every attempt has failed.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("Succeeded on attempt {} of {}", attempt, policy.max_attempts);
                }
                return Ok(value);
            }
            Err(e) if attempt >= policy.max_attempts => {
                tracing::error!(
                    "All {} attempts exhausted, last error: {}",
                    policy.max_attempts,
                    e
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for_retry(attempt - 1);
                tracing::warn!(
                    "Attempt {} of {} failed: {}; retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for_retry(0), Duration::from_secs(10));
        assert_eq!(policy.delay_for_retry(1), Duration::from_secs(30));
        assert_eq!(policy.delay_for_retry(2), Duration::from_secs(60));
    }

    #[test]
    fn test_delay_clamped_to_last_entry() {
        let policy = RetryPolicy::new(10, vec![Duration::from_secs(1), Duration::from_secs(5)]);
        assert_eq!(policy.delay_for_retry(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for_retry(7), Duration::from_secs(5));
    }

    #[test]
    fn test_empty_backoff_is_immediate() {
        let policy = RetryPolicy::new(2, Vec::new());
        assert_eq!(policy.delay_for_retry(0), Duration::ZERO);
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Vec::new()).max_attempts, 1);
    }

    #[test]
    fn test_from_config() {
        let config = WorkerConfig {
            max_attempts: 5,
            backoff_seconds: vec![2, 4],
            ..WorkerConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for_retry(1), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result: Result<(), String> = with_retry(&RetryPolicy::default(), |_| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("refresh panicked".to_string())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 10s before the 2nd attempt, 30s before the 3rd
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(40), "waited {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(41), "waited {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failure() {
        let result: Result<u32, String> = with_retry(&RetryPolicy::default(), |attempt| async move {
            if attempt < 2 {
                Err(format!("attempt {} failed", attempt))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result, Ok(2));
    }
}
