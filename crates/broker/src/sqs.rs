//! SQS broker adapter (cloud pull queue)
//!
//! Long-polls up to `max` messages per receive call, accumulating the
//! successfully parsed ones into a batch. Acknowledge deletes the message;
//! reject either resets its visibility (requeue) or leaves it to the
//! queue's redrive policy (the dead-letter path).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    Batch, BrokerConsumer, ContractError, Delivery, DeliveryHandle, Message, QueueBackend,
    QueuePublisher, RouteTarget, SqsConfig,
};
use observability::record_queue_publish;
use throttle::{retry_with_backoff, RateLimiter, RetryPolicy};

/// SQS caps a single receive call at 10 messages
const MAX_RECEIVE_COUNT: usize = 10;

/// SQS caps long-poll waits at 20 seconds
const MAX_WAIT_SECONDS: u64 = 20;

/// Pause after a failed receive before polling again
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

async fn build_client(region: &str) -> Client {
    let region_provider =
        RegionProviderChain::first_try(Region::new(region.to_string())).or_default_provider();
    let shared_config = aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await;
    Client::new(&shared_config)
}

/// Probe the queue so connect failures surface before consumption starts
async fn probe_queue(client: &Client, queue_url: &str) -> Result<(), String> {
    client
        .get_queue_attributes()
        .queue_url(queue_url)
        .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Consuming side of the SQS adapter
pub struct SqsConsumer {
    config: SqsConfig,
    client: Option<Client>,
}

impl SqsConsumer {
    pub fn new(config: SqsConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    fn client(&self) -> Result<&Client, ContractError> {
        self.client
            .as_ref()
            .ok_or_else(|| ContractError::broker_connection("sqs", "client not connected"))
    }

    fn receipt_handle(handle: DeliveryHandle) -> Result<String, ContractError> {
        match handle {
            DeliveryHandle::PullQueue { receipt_handle } => Ok(receipt_handle),
            DeliveryHandle::Amqp { .. } => Err(ContractError::broker_connection(
                "sqs",
                "received an AMQP handle on the pull-queue adapter",
            )),
        }
    }
}

impl BrokerConsumer for SqsConsumer {
    fn name(&self) -> &str {
        "sqs"
    }

    #[instrument(name = "sqs_connect", skip(self), fields(region = %self.config.region))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        let policy = RetryPolicy::connect();
        let region = self.config.region.clone();
        let queue_url = self.config.queue_url.clone();

        let client = retry_with_backoff(policy, "sqs_connect", || {
            let region = region.clone();
            let queue_url = queue_url.clone();
            async move {
                let client = build_client(&region).await;
                probe_queue(&client, &queue_url).await?;
                Ok::<_, String>(client)
            }
        })
        .await
        .map_err(|e| ContractError::ConnectionExhausted {
            backend: "sqs".to_string(),
            attempts: policy.max_attempts,
            message: e,
        })?;

        info!(region = %self.config.region, "connected to SQS");
        self.client = Some(client);
        Ok(())
    }

    async fn receive_batch(&mut self, max: usize, wait: Duration) -> Result<Batch, ContractError> {
        let client = self.client()?.clone();
        let queue_url = self.config.queue_url.clone();

        let response = client
            .receive_message()
            .queue_url(&queue_url)
            .max_number_of_messages(max.min(MAX_RECEIVE_COUNT) as i32)
            .wait_time_seconds(wait.as_secs().min(MAX_WAIT_SECONDS) as i32)
            .send()
            .await;

        let output = match response {
            Ok(output) => output,
            Err(e) => {
                // transient receive failure: pause and let the loop poll again
                error!(error = %e, "SQS receive failed, backing off");
                tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                return Ok(Vec::new());
            }
        };

        let mut batch: Batch = Vec::new();
        for raw in output.messages.unwrap_or_default() {
            let Some(receipt_handle) = raw.receipt_handle else {
                warn!("SQS message without a receipt handle, skipping");
                continue;
            };
            let body = raw.body.unwrap_or_default();

            match Message::from_slice(body.as_bytes()) {
                Ok(message) => batch.push(Delivery {
                    message,
                    handle: DeliveryHandle::PullQueue { receipt_handle },
                }),
                Err(e) => {
                    // permanent decode failure: remove it so the queue never
                    // redelivers what can never parse
                    warn!(error = %e, "unparseable message body, dropping");
                    if let Err(delete_err) = client
                        .delete_message()
                        .queue_url(&queue_url)
                        .receipt_handle(&receipt_handle)
                        .send()
                        .await
                    {
                        error!(error = %delete_err, "failed to drop unparseable message");
                    }
                }
            }
        }

        debug!(received = batch.len(), "SQS poll complete");
        Ok(batch)
    }

    async fn acknowledge(&mut self, handle: DeliveryHandle) -> Result<(), ContractError> {
        let receipt_handle = Self::receipt_handle(handle)?;
        self.client()?
            .delete_message()
            .queue_url(&self.config.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| ContractError::broker_connection("sqs", e.to_string()))
    }

    async fn reject(
        &mut self,
        handle: DeliveryHandle,
        requeue: bool,
    ) -> Result<(), ContractError> {
        let receipt_handle = Self::receipt_handle(handle)?;
        if requeue {
            // make the message visible again immediately
            self.client()?
                .change_message_visibility()
                .queue_url(&self.config.queue_url)
                .receipt_handle(receipt_handle)
                .visibility_timeout(0)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| ContractError::broker_connection("sqs", e.to_string()))
        } else {
            // leave it to the redrive policy - the dead-letter path
            debug!("message left for the queue's redrive policy");
            Ok(())
        }
    }

    #[instrument(name = "sqs_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.client = None;
        info!("SQS polling stopped");
        Ok(())
    }
}

/// Publishing side of the SQS adapter
pub struct SqsPublisher {
    config: SqsConfig,
    client: Client,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl SqsPublisher {
    /// Build the client and verify the queue is reachable
    #[instrument(name = "sqs_publisher_connect", skip(config, rate_limiter))]
    pub async fn connect(
        config: SqsConfig,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Result<Self, ContractError> {
        let policy = RetryPolicy::connect();
        let region = config.region.clone();
        let queue_url = config.queue_url.clone();

        let client = retry_with_backoff(policy, "sqs_publisher_connect", || {
            let region = region.clone();
            let queue_url = queue_url.clone();
            async move {
                let client = build_client(&region).await;
                probe_queue(&client, &queue_url).await?;
                Ok::<_, String>(client)
            }
        })
        .await
        .map_err(|e| ContractError::ConnectionExhausted {
            backend: "sqs".to_string(),
            attempts: policy.max_attempts,
            message: e,
        })?;

        info!("SQS publisher connected");
        Ok(Self {
            config,
            client,
            rate_limiter,
        })
    }
}

#[async_trait]
impl QueuePublisher for SqsPublisher {
    fn backend(&self) -> QueueBackend {
        QueueBackend::Sqs
    }

    #[instrument(name = "sqs_publish", skip(self, batch), fields(batch_len = batch.len()))]
    async fn publish(
        &self,
        batch: &[Message],
        route: Option<&RouteTarget>,
    ) -> Result<(), ContractError> {
        // a route override names a different queue URL; exchanges do not
        // apply to pull queues
        let queue_url = route
            .and_then(|r| r.queue.as_deref())
            .unwrap_or(&self.config.queue_url);

        for message in batch {
            if let Some(limiter) = &self.rate_limiter {
                limiter.acquire("sqs_publish").await;
            }

            let body = String::from_utf8(message.to_bytes()?.to_vec())
                .map_err(|e| ContractError::publish("sqs", e.to_string()))?;

            let start = Instant::now();
            let sent = self
                .client
                .send_message()
                .queue_url(queue_url)
                .message_body(body)
                .send()
                .await;
            let duration = start.elapsed().as_secs_f64();

            match sent {
                Ok(_) => {
                    record_queue_publish("sqs", "success", duration);
                    debug!(queue_url, "message published");
                }
                Err(e) => {
                    record_queue_publish("sqs", "failure", duration);
                    return Err(ContractError::publish("sqs", e.to_string()));
                }
            }
        }
        Ok(())
    }
}
