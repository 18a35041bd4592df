//! QueueSink - republishes the batch to the broker
//!
//! Broker connections are flaky by nature, so every write runs under the
//! publish retry schedule (3 attempts, exponential backoff 1s capped at
//! 10s).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use contracts::{ContractError, Message, OutputSink, QueuePublisher, RouteTarget};
use throttle::{retry_with_backoff, RetryPolicy};

/// Sink that republishes processed messages to the configured queue
pub struct QueueSink {
    publisher: Arc<dyn QueuePublisher>,
    route: Option<RouteTarget>,
    policy: RetryPolicy,
}

impl QueueSink {
    /// Republish through `publisher`, optionally overriding the route
    /// (paper-trading destination)
    pub fn new(publisher: Arc<dyn QueuePublisher>, route: Option<RouteTarget>) -> Self {
        Self::with_policy(publisher, route, RetryPolicy::publish())
    }

    /// Custom retry schedule (for testing)
    pub fn with_policy(
        publisher: Arc<dyn QueuePublisher>,
        route: Option<RouteTarget>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            publisher,
            route,
            policy,
        }
    }
}

#[async_trait]
impl OutputSink for QueueSink {
    fn name(&self) -> &str {
        "queue"
    }

    async fn write(&mut self, batch: &[Message]) -> Result<(), ContractError> {
        let publisher = Arc::clone(&self.publisher);
        let route = self.route.as_ref();

        retry_with_backoff(self.policy, "queue_sink_publish", || {
            publisher.publish(batch, route)
        })
        .await?;

        info!(
            backend = %self.publisher.backend(),
            messages = batch.len(),
            "output republished to queue"
        );
        Ok(())
    }
}
