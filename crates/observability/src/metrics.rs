//! Pipeline metric recording helpers
//!
//! Observability side effects only - never a correctness dependency.
//! Callers record outcomes; aggregation happens in Prometheus.

use metrics::{counter, histogram};

/// Record one batch received from the broker
pub fn record_batch_received(backend: &str, size: usize) {
    counter!(
        "qflow_batches_received_total",
        "backend" => backend.to_string()
    )
    .increment(1);
    histogram!(
        "qflow_batch_size",
        "backend" => backend.to_string()
    )
    .record(size as f64);
}

/// Record the terminal outcome of one consumed message
///
/// `status` is `acked` or `rejected`.
pub fn record_message_consumed(backend: &str, status: &str) {
    counter!(
        "qflow_messages_consumed_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record one sink call outcome
///
/// Every sink call records success/failure and its duration, keyed by sink
/// name.
pub fn record_dispatch_outcome(sink: &str, status: &str, duration_seconds: f64) {
    counter!(
        "qflow_output_dispatch_total",
        "sink" => sink.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "qflow_output_dispatch_duration_seconds",
        "sink" => sink.to_string(),
        "status" => status.to_string()
    )
    .record(duration_seconds);
}

/// Record one queue publish attempt
pub fn record_queue_publish(backend: &str, status: &str, duration_seconds: f64) {
    counter!(
        "qflow_queue_publish_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "qflow_queue_publish_duration_seconds",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .record(duration_seconds);
}

/// Record a paper-trading dispatch
pub fn record_paper_trade(target: &str, status: &str) {
    counter!(
        "qflow_paper_trades_total",
        "target" => target.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
