//! ObjectStoreSink - uploads the batch as one JSON object
//!
//! Each batch lands under a generated unique key; failures are recorded,
//! not retried.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::info;
use uuid::Uuid;

use contracts::{ContractError, Message, ObjectStoreSinkConfig, OutputSink};
use throttle::RateLimiter;

/// Sink that uploads batches to an object store bucket
pub struct ObjectStoreSink {
    client: Client,
    bucket: String,
    prefix: String,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl ObjectStoreSink {
    /// Build the client from ambient AWS configuration, honoring the
    /// configured region override
    pub async fn from_config(
        config: &ObjectStoreSinkConfig,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader
                .region(RegionProviderChain::first_try(Region::new(region.clone())).or_default_provider());
        }
        let shared_config = loader.load().await;

        Self {
            client: Client::new(&shared_config),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            rate_limiter,
        }
    }

    fn object_key(&self) -> String {
        format!("{}/{}.json", self.prefix.trim_end_matches('/'), Uuid::new_v4())
    }
}

#[async_trait]
impl OutputSink for ObjectStoreSink {
    fn name(&self) -> &str {
        "s3"
    }

    async fn write(&mut self, batch: &[Message]) -> Result<(), ContractError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire("s3_sink").await;
        }

        let body = serde_json::to_vec(batch)
            .map_err(|e| ContractError::sink_write("s3", e.to_string()))?;
        let key = self.object_key();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| ContractError::sink_write("s3", e.to_string()))?;

        info!(bucket = %self.bucket, key = %key, messages = batch.len(), "batch uploaded to object store");
        Ok(())
    }
}
