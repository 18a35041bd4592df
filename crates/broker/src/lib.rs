//! # Broker
//!
//! Broker adapters: two interchangeable backends behind the
//! [`contracts::BrokerConsumer`] / [`contracts::QueuePublisher`] contracts.
//!
//! - [`AmqpConsumer`] / [`AmqpPublisher`]: AMQP-style durable queue (RabbitMQ)
//! - [`SqsConsumer`] / [`SqsPublisher`]: cloud pull queue (Amazon SQS)
//!
//! Connection establishment retries with bounded exponential backoff and
//! surfaces `ConnectionExhausted` once the attempts run out.

mod amqp;
mod sqs;

pub use amqp::{AmqpConsumer, AmqpPublisher};
pub use sqs::{SqsConsumer, SqsPublisher};
