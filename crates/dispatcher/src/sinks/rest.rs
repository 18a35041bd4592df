//! RestSink - POSTs the batch as JSON to a configured endpoint
//!
//! Non-2xx responses and network failures are recorded sink failures; the
//! caller may re-dispatch, this sink never retries on its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use contracts::{ContractError, Message, OutputSink, RestSinkConfig};
use throttle::RateLimiter;

/// Sink that delivers batches to a REST endpoint
pub struct RestSink {
    client: reqwest::Client,
    url: String,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl RestSink {
    /// Build the HTTP client with the configured timeout
    ///
    /// # Errors
    /// Returns [`ContractError::SinkConnection`] when the client cannot be
    /// constructed.
    pub fn from_config(
        config: &RestSinkConfig,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Result<Self, ContractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ContractError::sink_connection("rest", e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            rate_limiter,
        })
    }
}

#[async_trait]
impl OutputSink for RestSink {
    fn name(&self) -> &str {
        "rest"
    }

    async fn write(&mut self, batch: &[Message]) -> Result<(), ContractError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire("rest_sink").await;
        }

        let response = self
            .client
            .post(&self.url)
            .json(batch)
            .send()
            .await
            .map_err(|e| ContractError::sink_write("rest", format!("request error: {e}")))?;

        let status = response.status();
        if status.is_success() {
            info!(
                status = status.as_u16(),
                messages = batch.len(),
                "batch posted to REST endpoint"
            );
            Ok(())
        } else {
            Err(ContractError::sink_write(
                "rest",
                format!("HTTP {}", status.as_u16()),
            ))
        }
    }
}
