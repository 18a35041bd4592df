//! Pipeline run statistics.

use std::time::Duration;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Broker backend name
    pub backend: String,

    /// Non-empty batches received from the broker
    pub batches_received: u64,

    /// Messages processed and acknowledged
    pub messages_acked: u64,

    /// Messages rejected toward the dead-letter path
    pub messages_rejected: u64,

    /// Sinks initialized for dispatch
    pub active_sinks: usize,

    /// Total duration of the run
    pub duration: Duration,
}

impl PipelineStats {
    /// Total messages that reached a terminal ack/reject
    pub fn messages_total(&self) -> u64 {
        self.messages_acked + self.messages_rejected
    }

    /// Messages per second over the whole run
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages_total() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Rejected share of all terminal messages, as a percentage
    pub fn reject_rate(&self) -> f64 {
        let total = self.messages_total();
        if total > 0 {
            (self.messages_rejected as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print a run summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");
        println!("  Backend: {}", self.backend);
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Batches received: {}", self.batches_received);
        println!("  Messages acknowledged: {}", self.messages_acked);
        println!("  Messages rejected: {}", self.messages_rejected);
        println!("  Reject rate: {:.2}%", self.reject_rate());
        println!("  Throughput: {:.2} msg/s", self.throughput());
        println!("  Active sinks: {}", self.active_sinks);
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let stats = PipelineStats {
            backend: "mock".into(),
            batches_received: 4,
            messages_acked: 30,
            messages_rejected: 10,
            active_sinks: 2,
            duration: Duration::from_secs(20),
        };
        assert_eq!(stats.messages_total(), 40);
        assert!((stats.throughput() - 2.0).abs() < f64::EPSILON);
        assert!((stats.reject_rate() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_duration_is_safe() {
        let stats = PipelineStats::default();
        assert_eq!(stats.throughput(), 0.0);
        assert_eq!(stats.reject_rate(), 0.0);
    }
}
