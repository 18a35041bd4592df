//! AMQP broker adapter (RabbitMQ)
//!
//! Declares a durable queue, sets prefetch to the configured batch size and
//! streams one delivery per `receive_batch` call - batch framing stays a
//! consumer-side concept, the ack/reject contract applies per message.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{debug, info, instrument, warn};

use contracts::{
    Batch, BrokerConsumer, ContractError, Delivery, DeliveryHandle, Message, QueueBackend,
    QueuePublisher, RabbitMqConfig, RouteTarget,
};
use observability::record_queue_publish;
use throttle::{retry_with_backoff, RateLimiter, RetryPolicy};

const CONSUMER_TAG: &str = "qflow-consumer";

/// Consuming side of the AMQP adapter
pub struct AmqpConsumer {
    config: RabbitMqConfig,
    batch_size: usize,
    connection: Option<Connection>,
    channel: Option<Channel>,
    deliveries: Option<lapin::Consumer>,
}

impl AmqpConsumer {
    pub fn new(config: RabbitMqConfig, batch_size: usize) -> Self {
        Self {
            config,
            batch_size,
            connection: None,
            channel: None,
            deliveries: None,
        }
    }

    async fn open(
        config: &RabbitMqConfig,
        batch_size: usize,
    ) -> Result<(Connection, Channel, lapin::Consumer), lapin::Error> {
        let connection =
            Connection::connect(&config.amqp_uri(), ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        let prefetch = u16::try_from(batch_size).unwrap_or(u16::MAX);
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;

        let deliveries = channel
            .basic_consume(
                &config.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok((connection, channel, deliveries))
    }

    fn channel(&self) -> Result<&Channel, ContractError> {
        self.channel
            .as_ref()
            .ok_or_else(|| ContractError::broker_connection("rabbitmq", "channel not open"))
    }

    fn delivery_tag(handle: DeliveryHandle) -> Result<u64, ContractError> {
        match handle {
            DeliveryHandle::Amqp { delivery_tag } => Ok(delivery_tag),
            DeliveryHandle::PullQueue { .. } => Err(ContractError::broker_connection(
                "rabbitmq",
                "received a pull-queue handle on the AMQP adapter",
            )),
        }
    }
}

impl BrokerConsumer for AmqpConsumer {
    fn name(&self) -> &str {
        "rabbitmq"
    }

    #[instrument(name = "amqp_connect", skip(self), fields(queue = %self.config.queue))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        let policy = RetryPolicy::connect();
        let config = self.config.clone();
        let batch_size = self.batch_size;

        let (connection, channel, deliveries) =
            retry_with_backoff(policy, "rabbitmq_connect", || {
                Self::open(&config, batch_size)
            })
            .await
            .map_err(|e| ContractError::ConnectionExhausted {
                backend: "rabbitmq".to_string(),
                attempts: policy.max_attempts,
                message: e.to_string(),
            })?;

        info!(
            queue = %self.config.queue,
            prefetch = self.batch_size,
            "connected to RabbitMQ"
        );

        self.connection = Some(connection);
        self.channel = Some(channel);
        self.deliveries = Some(deliveries);
        Ok(())
    }

    async fn receive_batch(&mut self, _max: usize, wait: Duration) -> Result<Batch, ContractError> {
        let next = {
            let deliveries = self.deliveries.as_mut().ok_or_else(|| {
                ContractError::broker_connection("rabbitmq", "consumer not started")
            })?;
            tokio::time::timeout(wait, deliveries.next()).await
        };

        let delivery = match next {
            // wait elapsed without data
            Err(_) => return Ok(Vec::new()),
            Ok(None) => {
                return Err(ContractError::broker_connection(
                    "rabbitmq",
                    "consumer stream closed",
                ))
            }
            Ok(Some(Err(e))) => {
                return Err(ContractError::broker_connection("rabbitmq", e.to_string()))
            }
            Ok(Some(Ok(delivery))) => delivery,
        };

        match Message::from_slice(&delivery.data) {
            Ok(message) => {
                debug!(delivery_tag = delivery.delivery_tag, "message received");
                Ok(vec![Delivery {
                    message,
                    handle: DeliveryHandle::Amqp {
                        delivery_tag: delivery.delivery_tag,
                    },
                }])
            }
            Err(e) => {
                // permanent decode failure: toward the dead-letter path
                warn!(
                    delivery_tag = delivery.delivery_tag,
                    error = %e,
                    "undecodable message body, rejecting without requeue"
                );
                self.channel()?
                    .basic_nack(
                        delivery.delivery_tag,
                        BasicNackOptions {
                            requeue: false,
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|e| ContractError::broker_connection("rabbitmq", e.to_string()))?;
                Ok(Vec::new())
            }
        }
    }

    async fn acknowledge(&mut self, handle: DeliveryHandle) -> Result<(), ContractError> {
        let delivery_tag = Self::delivery_tag(handle)?;
        self.channel()?
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| ContractError::broker_connection("rabbitmq", e.to_string()))
    }

    async fn reject(
        &mut self,
        handle: DeliveryHandle,
        requeue: bool,
    ) -> Result<(), ContractError> {
        let delivery_tag = Self::delivery_tag(handle)?;
        self.channel()?
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| ContractError::broker_connection("rabbitmq", e.to_string()))
    }

    #[instrument(name = "amqp_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.deliveries = None;
        self.channel = None;
        if let Some(connection) = self.connection.take() {
            connection
                .close(200, "shutting down")
                .await
                .map_err(|e| ContractError::broker_connection("rabbitmq", e.to_string()))?;
        }
        info!("RabbitMQ listener stopped");
        Ok(())
    }
}

/// Publishing side of the AMQP adapter
///
/// Owns its connection for the process lifetime: opened at startup, closed
/// when dropped.
pub struct AmqpPublisher {
    config: RabbitMqConfig,
    _connection: Connection,
    channel: Channel,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl AmqpPublisher {
    /// Connect and open a publish channel, retrying like the consumer side
    #[instrument(name = "amqp_publisher_connect", skip(config, rate_limiter))]
    pub async fn connect(
        config: RabbitMqConfig,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Result<Self, ContractError> {
        let policy = RetryPolicy::connect();
        let uri = config.amqp_uri();

        let (connection, channel) = retry_with_backoff(policy, "rabbitmq_publisher_connect", || {
            let uri = uri.clone();
            async move {
                let connection =
                    Connection::connect(&uri, ConnectionProperties::default()).await?;
                let channel = connection.create_channel().await?;
                Ok::<_, lapin::Error>((connection, channel))
            }
        })
        .await
        .map_err(|e| ContractError::ConnectionExhausted {
            backend: "rabbitmq".to_string(),
            attempts: policy.max_attempts,
            message: e.to_string(),
        })?;

        info!(exchange = %config.exchange, "RabbitMQ publisher connected");
        Ok(Self {
            config,
            _connection: connection,
            channel,
            rate_limiter,
        })
    }
}

/// Resolve exchange and routing key, honoring a per-call override
fn resolve_route<'a>(
    config: &'a RabbitMqConfig,
    route: Option<&'a RouteTarget>,
) -> (&'a str, &'a str) {
    let exchange = route
        .and_then(|r| r.exchange.as_deref())
        .unwrap_or(&config.exchange);
    let routing_key = route
        .and_then(|r| r.queue.as_deref())
        .or(config.routing_key.as_deref())
        .unwrap_or(&config.queue);
    (exchange, routing_key)
}

#[async_trait]
impl QueuePublisher for AmqpPublisher {
    fn backend(&self) -> QueueBackend {
        QueueBackend::Rabbitmq
    }

    #[instrument(name = "amqp_publish", skip(self, batch), fields(batch_len = batch.len()))]
    async fn publish(
        &self,
        batch: &[Message],
        route: Option<&RouteTarget>,
    ) -> Result<(), ContractError> {
        let (exchange, routing_key) = resolve_route(&self.config, route);

        for message in batch {
            if let Some(limiter) = &self.rate_limiter {
                limiter.acquire("rabbitmq_publish").await;
            }

            let payload = message.to_bytes()?;
            let start = Instant::now();
            let published = async {
                self.channel
                    .basic_publish(
                        exchange,
                        routing_key,
                        BasicPublishOptions::default(),
                        &payload,
                        BasicProperties::default().with_delivery_mode(2),
                    )
                    .await?
                    .await
            }
            .await;
            let duration = start.elapsed().as_secs_f64();

            match published {
                Ok(_) => {
                    record_queue_publish("rabbitmq", "success", duration);
                    debug!(exchange, routing_key, "message published");
                }
                Err(e) => {
                    record_queue_publish("rabbitmq", "failure", duration);
                    return Err(ContractError::publish("rabbitmq", e.to_string()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RabbitMqConfig {
        RabbitMqConfig {
            host: "localhost".into(),
            port: 5672,
            vhost: "/".into(),
            username: "guest".into(),
            password: "guest".into(),
            queue: "market-data".into(),
            exchange: String::new(),
            routing_key: None,
        }
    }

    #[test]
    fn test_delivery_tag_rejects_foreign_handle() {
        let handle = DeliveryHandle::PullQueue {
            receipt_handle: "abc".into(),
        };
        assert!(AmqpConsumer::delivery_tag(handle).is_err());
        assert_eq!(
            AmqpConsumer::delivery_tag(DeliveryHandle::Amqp { delivery_tag: 7 }).unwrap(),
            7
        );
    }

    #[test]
    fn test_route_resolution_defaults_to_queue() {
        let config = config();
        let (exchange, routing_key) = resolve_route(&config, None);
        assert_eq!(exchange, "");
        assert_eq!(routing_key, "market-data");
    }

    #[test]
    fn test_route_resolution_prefers_routing_key() {
        let config = RabbitMqConfig {
            routing_key: Some("ticks.processed".into()),
            ..config()
        };
        let (_, routing_key) = resolve_route(&config, None);
        assert_eq!(routing_key, "ticks.processed");
    }

    #[test]
    fn test_route_resolution_honors_override() {
        let config = config();
        let paper = RouteTarget {
            queue: Some("paper-trades".into()),
            exchange: Some("simulation".into()),
        };
        let (exchange, routing_key) = resolve_route(&config, Some(&paper));
        assert_eq!(exchange, "simulation");
        assert_eq!(routing_key, "paper-trades");
    }
}
