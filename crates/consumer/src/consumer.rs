//! Consumer loop
//!
//! One long-lived worker per process. Blocks on broker I/O, forwards each
//! decoded message to the processing callback, and acknowledges or rejects
//! per message - one failure never aborts the rest of the batch or the
//! loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use contracts::{BrokerConsumer, ContractError, Delivery, Processor};
use observability::{record_batch_received, record_message_consumed};

use crate::metrics::ConsumerMetrics;
use crate::state::ConsumerState;

/// Broker-agnostic consumer loop
pub struct Consumer<B: BrokerConsumer> {
    adapter: B,
    batch_size: usize,
    wait: Duration,
    shutdown: CancellationToken,
    state: ConsumerState,
    metrics: Arc<ConsumerMetrics>,
}

impl<B: BrokerConsumer> Consumer<B> {
    /// Create a consumer over an unconnected adapter
    ///
    /// `shutdown` is the cooperative stop signal: once cancelled, no new
    /// batch is fetched and in-flight messages finish before the adapter
    /// closes.
    pub fn new(
        adapter: B,
        batch_size: usize,
        wait: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            adapter,
            batch_size,
            wait,
            shutdown,
            state: ConsumerState::Disconnected,
            metrics: Arc::new(ConsumerMetrics::new()),
        }
    }

    /// Shared counters for run statistics
    pub fn metrics(&self) -> Arc<ConsumerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    fn transition(&mut self, next: ConsumerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        info!(from = %self.state, to = %next, "consumer state change");
        self.state = next;
    }

    /// Run until cooperative shutdown
    ///
    /// Connects the adapter (fatal after internal retries are exhausted),
    /// then polls for batches and processes them message by message until
    /// the shutdown token fires.
    ///
    /// # Errors
    /// Connection exhaustion, broker failures on the AMQP path, and
    /// ack/reject failures are fatal and end the loop.
    #[instrument(name = "consumer_run", skip(self, processor), fields(backend = self.adapter.name()))]
    pub async fn run<P: Processor>(&mut self, processor: &mut P) -> Result<(), ContractError> {
        self.transition(ConsumerState::Connecting);
        self.adapter.connect().await?;
        self.transition(ConsumerState::Consuming);

        info!(
            batch_size = self.batch_size,
            wait_seconds = self.wait.as_secs_f64(),
            "consuming messages"
        );

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                received = self.adapter.receive_batch(self.batch_size, self.wait) => received,
            };

            let batch = received?;
            if batch.is_empty() {
                continue;
            }

            record_batch_received(self.adapter.name(), batch.len());
            self.metrics.record_batch();
            self.process_batch(processor, batch).await?;
        }

        self.transition(ConsumerState::Draining);
        self.adapter.close().await?;
        self.transition(ConsumerState::Stopped);

        info!(
            acked = self.metrics.messages_acked(),
            rejected = self.metrics.messages_rejected(),
            "consumer stopped"
        );
        Ok(())
    }

    /// Process one batch, acknowledging or rejecting each message
    async fn process_batch<P: Processor>(
        &mut self,
        processor: &mut P,
        batch: Vec<Delivery>,
    ) -> Result<(), ContractError> {
        for Delivery { message, handle } in batch {
            if !message.is_well_formed() {
                warn!("message is missing its symbol or timestamp");
            }

            match processor.process(std::slice::from_ref(&message)).await {
                Ok(()) => {
                    self.adapter.acknowledge(handle).await?;
                    self.metrics.record_acked();
                    record_message_consumed(self.adapter.name(), "acked");
                    debug!("message processed and acknowledged");
                }
                Err(error) => {
                    // per-message isolation: toward the dead-letter path,
                    // then keep going
                    warn!(error = %error, "processing failed, rejecting without requeue");
                    self.adapter.reject(handle, false).await?;
                    self.metrics.record_rejected();
                    record_message_consumed(self.adapter.name(), "rejected");
                }
            }
        }
        Ok(())
    }
}
