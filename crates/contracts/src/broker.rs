//! Broker-facing traits
//!
//! One contract, two interchangeable backends: an AMQP-style durable queue
//! and a cloud pull-queue. The consumer loop only sees this interface.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Batch, ContractError, DeliveryHandle, Message};

/// Queue backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    Rabbitmq,
    Sqs,
}

impl QueueBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rabbitmq => "rabbitmq",
            Self::Sqs => "sqs",
        }
    }
}

impl fmt::Display for QueueBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker consumption trait
///
/// All broker adapters must implement this trait. A handle returned by
/// [`BrokerConsumer::receive_batch`] is consumed exactly once, by either
/// `acknowledge` or `reject`.
#[trait_variant::make(BrokerConsumer: Send)]
pub trait LocalBrokerConsumer {
    /// Backend name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Establish the broker connection
    ///
    /// Transient failures are retried internally with bounded exponential
    /// backoff; exhaustion surfaces as [`ContractError::ConnectionExhausted`].
    ///
    /// # Errors
    /// Fatal once retries are exhausted - the caller must not continue.
    async fn connect(&mut self) -> Result<(), ContractError>;

    /// Receive up to `max` messages, waiting at most `wait` for data
    ///
    /// An empty batch means the wait elapsed without data. Unparseable
    /// bodies are dropped with a warning and never appear in the batch.
    async fn receive_batch(&mut self, max: usize, wait: Duration) -> Result<Batch, ContractError>;

    /// Acknowledge one delivery
    async fn acknowledge(&mut self, handle: DeliveryHandle) -> Result<(), ContractError>;

    /// Reject one delivery
    ///
    /// With `requeue` false the message heads toward the dead-letter path.
    async fn reject(&mut self, handle: DeliveryHandle, requeue: bool)
        -> Result<(), ContractError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Processing callback applied to consumed messages
///
/// The consumer loop isolates errors per message: a failing call rejects
/// only the message it was given.
#[trait_variant::make(Processor: Send)]
pub trait LocalProcessor {
    async fn process(&mut self, batch: &[Message]) -> Result<(), ContractError>;
}
