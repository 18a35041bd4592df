//! # Throttle
//!
//! Rate limiting and retry primitives shared by outbound callers.
//!
//! - [`RateLimiter`]: thread-safe token bucket; one instance is typically
//!   shared across all calls to one external API
//! - [`retry_with_backoff`]: bounded exponential backoff around an explicit
//!   unit of work
//!
//! ## Example
//!
//! ```ignore
//! let limiter = Arc::new(RateLimiter::new(5, 60.0)?);
//! limiter.acquire("rest_sink").await;
//! ```

mod rate_limiter;
mod retry;

pub use rate_limiter::{RateLimiter, ThrottleError};
pub use retry::{retry_with_backoff, RetryPolicy};
