//! Token-bucket rate limiter
//!
//! Allows `max_requests` acquisitions per `window_seconds`. The whole
//! acquire sequence (refill, check, sleep, decrement) is a single critical
//! section: the lock is held across the sleep so token consumption is
//! globally ordered and a concurrent acquirer never reads a stale refill
//! timestamp.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Rate limiter construction errors
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// Invalid rate limit parameters
    #[error("invalid rate limiter config: {message}")]
    InvalidConfig { message: String },
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A rate limiter based on the token bucket algorithm
///
/// The bucket starts full. Tokens replenish continuously at
/// `max_requests / window_seconds` per second, capped at `max_requests`.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: f64,
    window_seconds: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a rate limiter allowing `max_requests` per `window_seconds`
    ///
    /// # Errors
    /// Returns [`ThrottleError::InvalidConfig`] when `max_requests` is zero
    /// or `window_seconds` is not positive.
    pub fn new(max_requests: u32, window_seconds: f64) -> Result<Self, ThrottleError> {
        if max_requests == 0 {
            return Err(ThrottleError::InvalidConfig {
                message: "max_requests must be > 0".to_string(),
            });
        }
        if !(window_seconds > 0.0) {
            return Err(ThrottleError::InvalidConfig {
                message: format!("window_seconds must be > 0, got {window_seconds}"),
            });
        }

        let max_requests = f64::from(max_requests);
        Ok(Self {
            max_requests,
            window_seconds,
            bucket: Mutex::new(Bucket {
                tokens: max_requests,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Acquire permission to proceed, blocking until a token is available
    ///
    /// `context` tags log lines so callers sharing one limiter stay
    /// distinguishable.
    pub async fn acquire(&self, context: &str) {
        let mut bucket = self.bucket.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        let replenished = elapsed * (self.max_requests / self.window_seconds);
        bucket.tokens = (bucket.tokens + replenished).min(self.max_requests);
        bucket.last_refill = now;

        debug!(
            context,
            replenished = format!("{replenished:.2}"),
            tokens = format!("{:.2}", bucket.tokens),
            "tokens replenished"
        );

        if bucket.tokens < 1.0 {
            let sleep_seconds = ((1.0 - bucket.tokens)
                * (self.window_seconds / self.max_requests))
                .min(self.window_seconds);
            info!(
                context,
                sleep_seconds = format!("{sleep_seconds:.2}"),
                "rate limit reached, waiting for a token"
            );
            tokio::time::sleep(Duration::from_secs_f64(sleep_seconds)).await;
            bucket.tokens = 1.0;
        }

        bucket.tokens -= 1.0;
        debug!(
            context,
            tokens = format!("{:.2}", bucket.tokens),
            "token consumed"
        );
    }

    /// Tokens currently available (observation point for tests/diagnostics)
    pub async fn available(&self) -> f64 {
        self.bucket.lock().await.tokens
    }

    /// Configured request ceiling per window
    pub fn max_requests(&self) -> f64 {
        self.max_requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_rejects_zero_requests() {
        assert!(RateLimiter::new(0, 1.0).is_err());
    }

    #[test]
    fn test_rejects_non_positive_window() {
        assert!(RateLimiter::new(5, 0.0).is_err());
        assert!(RateLimiter::new(5, -1.0).is_err());
        assert!(RateLimiter::new(5, f64::NAN).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_capacity_does_not_sleep() {
        let limiter = RateLimiter::new(5, 10.0).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire("test").await;
        }
        // Paused clock only advances across sleeps; no sleep means no time passed
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_over_capacity_sleeps_one_slot() {
        let limiter = RateLimiter::new(5, 10.0).unwrap();
        for _ in 0..5 {
            limiter.acquire("test").await;
        }

        // Sixth call must wait for one token: window / max_requests = 2s
        let start = Instant::now();
        limiter.acquire("test").await;
        let waited = start.elapsed();
        assert!(
            waited >= Duration::from_millis(1900) && waited <= Duration::from_millis(2100),
            "waited {waited:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_count_invariant() {
        let limiter = RateLimiter::new(3, 3.0).unwrap();

        for _ in 0..7 {
            limiter.acquire("test").await;
            let tokens = limiter.available().await;
            assert!(
                (0.0..=limiter.max_requests()).contains(&tokens),
                "tokens out of range: {tokens}"
            );
        }

        // A long idle period must not overfill the bucket
        tokio::time::advance(Duration::from_secs(60)).await;
        limiter.acquire("test").await;
        let tokens = limiter.available().await;
        assert!(tokens <= limiter.max_requests());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_after_idle() {
        let limiter = RateLimiter::new(2, 2.0).unwrap();
        limiter.acquire("test").await;
        limiter.acquire("test").await;
        assert!(limiter.available().await < 1.0);

        // Full window elapsed: bucket back at capacity, acquire is immediate
        tokio::time::advance(Duration::from_secs(2)).await;
        let start = Instant::now();
        limiter.acquire("test").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_across_tasks() {
        let limiter = Arc::new(RateLimiter::new(4, 8.0).unwrap());
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire("shared").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 4 immediate; the 5th sleeps one slot (2s); the token replenished
        // during that sleep covers the 6th
        let waited = start.elapsed();
        assert!(
            waited >= Duration::from_millis(1900) && waited <= Duration::from_millis(4100),
            "waited {waited:?}"
        );
        let tokens = limiter.available().await;
        assert!((0.0..=4.0).contains(&tokens));
    }
}
