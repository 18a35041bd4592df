//! Consumer metrics
//!
//! In-process counters for run statistics; the Prometheus facade is fed
//! separately by the loop.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one consumer instance
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    /// Non-empty batches received
    batches_received: AtomicU64,

    /// Messages acknowledged
    messages_acked: AtomicU64,

    /// Messages rejected toward the dead-letter path
    messages_rejected: AtomicU64,
}

impl ConsumerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one received batch
    pub fn record_batch(&self) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one acknowledged message
    pub fn record_acked(&self) {
        self.messages_acked.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one rejected message
    pub fn record_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Batches received so far
    pub fn batches_received(&self) -> u64 {
        self.batches_received.load(Ordering::Relaxed)
    }

    /// Messages acknowledged so far
    pub fn messages_acked(&self) -> u64 {
        self.messages_acked.load(Ordering::Relaxed)
    }

    /// Messages rejected so far
    pub fn messages_rejected(&self) -> u64 {
        self.messages_rejected.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_received: self.batches_received(),
            messages_acked: self.messages_acked(),
            messages_rejected: self.messages_rejected(),
        }
    }
}

/// Point-in-time copy of the counters (for reporting)
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub batches_received: u64,
    pub messages_acked: u64,
    pub messages_rejected: u64,
}
