//! Scripted broker and processor test doubles
//!
//! Used by this crate's tests and the cross-crate integration tests; no
//! broker server required.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use contracts::{
    Batch, BrokerConsumer, ContractError, Delivery, DeliveryHandle, Message, Processor,
};

#[derive(Debug, Default)]
struct Counters {
    receive_calls: AtomicUsize,
    acked: AtomicUsize,
    rejected: AtomicUsize,
    requeued: AtomicUsize,
    connected: AtomicBool,
    closed: AtomicBool,
}

/// Shared view of a [`MockBroker`]'s counters
///
/// Clone it before handing the broker to a consumer; the counters stay
/// observable after the move.
#[derive(Debug, Clone, Default)]
pub struct MockCounters(Arc<Counters>);

impl MockCounters {
    pub fn receive_calls(&self) -> usize {
        self.0.receive_calls.load(Ordering::SeqCst)
    }

    pub fn acked(&self) -> usize {
        self.0.acked.load(Ordering::SeqCst)
    }

    pub fn rejected(&self) -> usize {
        self.0.rejected.load(Ordering::SeqCst)
    }

    pub fn requeued(&self) -> usize {
        self.0.requeued.load(Ordering::SeqCst)
    }

    pub fn connected(&self) -> bool {
        self.0.connected.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.0.closed.load(Ordering::SeqCst)
    }
}

/// Broker adapter that replays a script of batches
pub struct MockBroker {
    batches: VecDeque<Vec<Message>>,
    counters: MockCounters,
    cancel_when_drained: Option<CancellationToken>,
    next_tag: u64,
}

impl MockBroker {
    /// Script the batches the broker will deliver, in order
    pub fn new(batches: Vec<Vec<Message>>) -> Self {
        Self {
            batches: batches.into(),
            counters: MockCounters::default(),
            cancel_when_drained: None,
            next_tag: 0,
        }
    }

    /// Cancel `token` once the script runs dry, ending a consumer loop
    /// deterministically
    pub fn cancel_when_drained(mut self, token: CancellationToken) -> Self {
        self.cancel_when_drained = Some(token);
        self
    }

    /// Counter view that survives moving the broker into a consumer
    pub fn counters(&self) -> MockCounters {
        self.counters.clone()
    }
}

impl BrokerConsumer for MockBroker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&mut self) -> Result<(), ContractError> {
        self.counters.0.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn receive_batch(&mut self, _max: usize, wait: Duration) -> Result<Batch, ContractError> {
        self.counters.0.receive_calls.fetch_add(1, Ordering::SeqCst);

        match self.batches.pop_front() {
            Some(messages) => {
                let first_tag = self.next_tag + 1;
                self.next_tag += messages.len() as u64;
                Ok(messages
                    .into_iter()
                    .enumerate()
                    .map(|(offset, message)| Delivery {
                        message,
                        handle: DeliveryHandle::Amqp {
                            delivery_tag: first_tag + offset as u64,
                        },
                    })
                    .collect())
            }
            None => {
                if let Some(token) = &self.cancel_when_drained {
                    token.cancel();
                }
                tokio::time::sleep(wait).await;
                Ok(Vec::new())
            }
        }
    }

    async fn acknowledge(&mut self, _handle: DeliveryHandle) -> Result<(), ContractError> {
        self.counters.0.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reject(
        &mut self,
        _handle: DeliveryHandle,
        requeue: bool,
    ) -> Result<(), ContractError> {
        self.counters.0.rejected.fetch_add(1, Ordering::SeqCst);
        if requeue {
            self.counters.0.requeued.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.counters.0.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Processor that records symbols and can fail or cancel on cue
#[derive(Debug, Default)]
pub struct RecordingProcessor {
    seen: Vec<String>,
    fail_symbol: Option<String>,
    cancel_trigger: Option<(String, CancellationToken)>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any message carrying this symbol
    pub fn fail_on(mut self, symbol: &str) -> Self {
        self.fail_symbol = Some(symbol.to_string());
        self
    }

    /// Cancel `token` when this symbol is processed (shutdown mid-batch)
    pub fn cancel_on(mut self, symbol: &str, token: CancellationToken) -> Self {
        self.cancel_trigger = Some((symbol.to_string(), token));
        self
    }

    /// Symbols processed successfully, in order
    pub fn seen(&self) -> Vec<String> {
        self.seen.clone()
    }
}

impl Processor for RecordingProcessor {
    async fn process(&mut self, batch: &[Message]) -> Result<(), ContractError> {
        for message in batch {
            let symbol = message.symbol().unwrap_or("<none>").to_string();

            if let Some((trigger, token)) = &self.cancel_trigger {
                if *trigger == symbol {
                    token.cancel();
                }
            }

            if self.fail_symbol.as_deref() == Some(symbol.as_str()) {
                return Err(ContractError::processing(format!(
                    "simulated failure for {symbol}"
                )));
            }

            self.seen.push(symbol);
        }
        Ok(())
    }
}
