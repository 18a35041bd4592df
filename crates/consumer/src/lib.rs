//! # Consumer
//!
//! The broker-agnostic consumer loop: polls an adapter for batches,
//! applies the processing callback per message with error isolation, and
//! converts shutdown signals into a cooperative stop that drains in-flight
//! work before closing the connection.

mod consumer;
mod metrics;
mod state;

pub mod mock;

pub use consumer::Consumer;
pub use metrics::{ConsumerMetrics, MetricsSnapshot};
pub use state::ConsumerState;
