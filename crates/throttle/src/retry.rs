//! Bounded exponential backoff around an explicit unit of work
//!
//! The retry policy is a value, the operation is a closure, and the result
//! comes back as a plain `Result` - no decorator or exception-driven
//! control flow.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Retry schedule: attempt count plus a doubling, capped delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry; doubles each subsequent retry
    pub base_delay: Duration,

    /// Delay ceiling
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Schedule for broker connection establishment
    pub fn connect() -> Self {
        Self::new(5, Duration::from_secs(2), Duration::from_secs(10))
    }

    /// Schedule for queue republish
    pub fn publish() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10))
    }

    /// Delay after the given 1-based failed attempt
    fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds or the policy is exhausted
///
/// Returns the first success, or the last error once `max_attempts` calls
/// have failed. `context` tags the log lines.
///
/// # Errors
/// The final attempt's error, unchanged.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    context: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 1;
    loop {
        debug!(context, attempt, max_attempts = policy.max_attempts, "attempting operation");
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    context,
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                warn!(context, attempt, error = %error, "all attempts failed");
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(6, Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
        assert_eq!(policy.delay_after(4), Duration::from_secs(8));
        assert_eq!(policy.delay_after(5), Duration::from_secs(10));
    }

    #[test]
    fn test_connect_schedule() {
        let policy = RetryPolicy::connect();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(4), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&calls);

        let result: Result<u32, String> =
            retry_with_backoff(RetryPolicy::publish(), "test", move || {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&calls);

        let result: Result<&str, String> =
            retry_with_backoff(RetryPolicy::publish(), "test", move || {
                let counted = Arc::clone(&counted);
                async move {
                    let call = counted.fetch_add(1, Ordering::SeqCst) + 1;
                    if call < 3 {
                        Err(format!("boom {call}"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&calls);

        let result: Result<(), String> =
            retry_with_backoff(RetryPolicy::publish(), "test", move || {
                let counted = Arc::clone(&counted);
                async move {
                    let call = counted.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(format!("boom {call}"))
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), "boom 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
