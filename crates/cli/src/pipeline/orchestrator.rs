//! Pipeline orchestrator - wires broker, consumer, and dispatcher.
//!
//! The consumer loop is the single long-lived worker; the dispatcher runs
//! synchronously inside its processing callback, so a slow sink throttles
//! the loop directly. That trade-off is accepted: batches are small.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use broker::{AmqpConsumer, AmqpPublisher, SqsConsumer, SqsPublisher};
use consumer::Consumer;
use contracts::{BrokerConsumer, QueueBackend, QueuePublisher, ServiceBlueprint};
use dispatcher::{DispatcherBuilder, SinkDependencies};
use throttle::RateLimiter;

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The service blueprint
    pub blueprint: ServiceBlueprint,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Run timeout (None = run until shutdown signal)
    pub timeout: Option<Duration>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until cooperative shutdown
    pub async fn run(self, shutdown: CancellationToken) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Shared outbound rate limiter
        let rate_limiter = match &blueprint.rate_limit {
            Some(limit) => {
                let limiter = RateLimiter::new(limit.max_requests, limit.window_seconds)
                    .context("Invalid rate limit configuration")?;
                info!(
                    max_requests = limit.max_requests,
                    window_seconds = limit.window_seconds,
                    "Outbound rate limiting enabled"
                );
                Some(Arc::new(limiter))
            }
            None => None,
        };

        // Optional run timeout arms the same cooperative stop signal
        if let Some(timeout) = self.config.timeout {
            let token = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(timeout_secs = timeout.as_secs(), "Run timeout reached, stopping");
                token.cancel();
            });
        }

        match blueprint.broker.backend {
            QueueBackend::Rabbitmq => {
                let config = blueprint
                    .broker
                    .rabbitmq
                    .clone()
                    .context("missing [broker.rabbitmq] section")?;

                let publisher: Option<Arc<dyn QueuePublisher>> =
                    if blueprint.outputs.needs_publisher() {
                        let publisher =
                            AmqpPublisher::connect(config.clone(), rate_limiter.clone())
                                .await
                                .context("Failed to connect the queue publisher")?;
                        Some(Arc::new(publisher))
                    } else {
                        None
                    };

                let adapter = AmqpConsumer::new(config, blueprint.broker.batch_size);
                self.run_with(adapter, publisher, rate_limiter, shutdown, start_time)
                    .await
            }
            QueueBackend::Sqs => {
                let config = blueprint
                    .broker
                    .sqs
                    .clone()
                    .context("missing [broker.sqs] section")?;

                let publisher: Option<Arc<dyn QueuePublisher>> =
                    if blueprint.outputs.needs_publisher() {
                        let publisher =
                            SqsPublisher::connect(config.clone(), rate_limiter.clone())
                                .await
                                .context("Failed to connect the queue publisher")?;
                        Some(Arc::new(publisher))
                    } else {
                        None
                    };

                let adapter = SqsConsumer::new(config);
                self.run_with(adapter, publisher, rate_limiter, shutdown, start_time)
                    .await
            }
        }
    }

    /// Backend-independent wiring: dispatcher as the processing callback
    async fn run_with<B: BrokerConsumer>(
        &self,
        adapter: B,
        publisher: Option<Arc<dyn QueuePublisher>>,
        rate_limiter: Option<Arc<RateLimiter>>,
        shutdown: CancellationToken,
        start_time: Instant,
    ) -> Result<PipelineStats> {
        let blueprint = &self.config.blueprint;

        let deps = SinkDependencies {
            publisher,
            rate_limiter,
            redact_payloads: blueprint.service.redact_payloads,
        };
        let mut output_dispatcher = DispatcherBuilder::new(blueprint.outputs.clone(), deps)
            .build()
            .await
            .context("Failed to create dispatcher")?;

        info!(sinks = output_dispatcher.sink_count(), "Dispatcher ready");

        let wait = Duration::from_secs_f64(blueprint.broker.wait_seconds);
        let mut message_consumer = Consumer::new(
            adapter,
            blueprint.broker.batch_size,
            wait,
            shutdown,
        );
        let metrics = message_consumer.metrics();

        message_consumer
            .run(&mut output_dispatcher)
            .await
            .context("Consumer loop failed")?;

        let snapshot = metrics.snapshot();
        Ok(PipelineStats {
            backend: blueprint.broker.backend.to_string(),
            batches_received: snapshot.batches_received,
            messages_acked: snapshot.messages_acked,
            messages_rejected: snapshot.messages_rejected,
            active_sinks: output_dispatcher.sink_count(),
            duration: start_time.elapsed(),
        })
    }
}
