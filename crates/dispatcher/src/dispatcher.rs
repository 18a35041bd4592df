//! Output dispatcher - mode resolution and fan-out to sinks
//!
//! Resolution order: paper trading (when enabled) short-circuits the mode
//! list and routes the whole batch through its single target; otherwise
//! every configured mode is dispatched in order. Unknown mode strings warn
//! and are skipped - they never abort dispatch to the recognized modes.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use contracts::{
    validate_batch_shape, ContractError, Message, OutputMode, OutputSink, OutputsConfig,
    Processor, QueuePublisher, RouteTarget,
};
use observability::{record_dispatch_outcome, record_paper_trade};
use throttle::RateLimiter;

use crate::error::DispatcherError;
use crate::sinks::{DatabaseSink, LogSink, ObjectStoreSink, QueueSink, RestSink, StdoutSink};

/// Dispatcher routing configuration
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Output modes in configured order (duplicates harmless)
    pub modes: Vec<String>,

    /// Paper-trading override flag
    pub paper_trading_enabled: bool,

    /// Paper-trading target mode
    pub paper_trading_mode: String,
}

impl DispatcherConfig {
    /// Extract the routing portion of the outputs configuration
    pub fn from_outputs(outputs: &OutputsConfig) -> Self {
        Self {
            modes: outputs.modes.clone(),
            paper_trading_enabled: outputs.paper_trading.enabled,
            paper_trading_mode: outputs.paper_trading.mode.clone(),
        }
    }
}

/// External collaborators handed to sink constructors
#[derive(Default)]
pub struct SinkDependencies {
    /// Broker republish client (required when any path uses the queue sink)
    pub publisher: Option<Arc<dyn QueuePublisher>>,

    /// Shared outbound rate limiter
    pub rate_limiter: Option<Arc<RateLimiter>>,

    /// Replace payloads with a placeholder in log output
    pub redact_payloads: bool,
}

/// Builder for creating an OutputDispatcher from configuration
pub struct DispatcherBuilder {
    outputs: OutputsConfig,
    deps: SinkDependencies,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(outputs: OutputsConfig, deps: SinkDependencies) -> Self {
        Self { outputs, deps }
    }

    /// Build the dispatcher, constructing one sink per required mode
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<OutputDispatcher, DispatcherError> {
        let mut sinks: HashMap<OutputMode, Box<dyn OutputSink>> = HashMap::new();
        for mode in self.outputs.required_modes() {
            let sink = create_sink(mode, &self.outputs, &self.deps).await?;
            sinks.insert(mode, sink);
        }

        info!(sinks = sinks.len(), "dispatcher sinks initialized");
        Ok(OutputDispatcher {
            config: DispatcherConfig::from_outputs(&self.outputs),
            sinks,
        })
    }
}

/// Create one sink handler from configuration
#[instrument(
    name = "dispatcher_create_sink",
    skip(outputs, deps),
    fields(mode = %mode)
)]
async fn create_sink(
    mode: OutputMode,
    outputs: &OutputsConfig,
    deps: &SinkDependencies,
) -> Result<Box<dyn OutputSink>, DispatcherError> {
    match mode {
        OutputMode::Log => Ok(Box::new(LogSink::new(deps.redact_payloads))),
        OutputMode::Stdout => Ok(Box::new(StdoutSink::new())),
        OutputMode::Queue => {
            let publisher = deps.publisher.as_ref().map(Arc::clone).ok_or_else(|| {
                DispatcherError::sink_creation("queue", "no queue publisher available")
            })?;
            let route = paper_route(outputs);
            Ok(Box::new(QueueSink::new(publisher, route)))
        }
        OutputMode::Rest => {
            let config = outputs.rest.as_ref().ok_or_else(|| {
                DispatcherError::sink_creation("rest", "missing [outputs.rest] section")
            })?;
            let sink = RestSink::from_config(config, deps.rate_limiter.clone())
                .map_err(|e| DispatcherError::sink_creation("rest", e.to_string()))?;
            Ok(Box::new(sink))
        }
        OutputMode::S3 => {
            let config = outputs.s3.as_ref().ok_or_else(|| {
                DispatcherError::sink_creation("s3", "missing [outputs.s3] section")
            })?;
            let sink = ObjectStoreSink::from_config(config, deps.rate_limiter.clone()).await;
            Ok(Box::new(sink))
        }
        OutputMode::Database => {
            let config = outputs.database.as_ref().ok_or_else(|| {
                DispatcherError::sink_creation("database", "missing [outputs.database] section")
            })?;
            let sink = DatabaseSink::connect(config)
                .await
                .map_err(|e| DispatcherError::sink_creation("database", e.to_string()))?;
            Ok(Box::new(sink))
        }
    }
}

/// Route override for the paper-trading queue destination
fn paper_route(outputs: &OutputsConfig) -> Option<RouteTarget> {
    let paper = &outputs.paper_trading;
    if paper.enabled && (paper.queue.is_some() || paper.exchange.is_some()) {
        Some(RouteTarget {
            queue: paper.queue.clone(),
            exchange: paper.exchange.clone(),
        })
    } else {
        None
    }
}

/// Outcome of one sink call within a `send`
#[derive(Debug, Clone, Copy)]
pub struct SinkOutcome {
    pub mode: OutputMode,
    pub success: bool,
    pub duration: Duration,
}

/// Result of one `send` call: per-sink outcomes in dispatch order
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub outcomes: Vec<SinkOutcome>,

    /// Modes skipped because they were unknown or had no sink
    pub skipped: usize,
}

impl DispatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// Routes processed batches to the configured destinations
///
/// State is loaded once at startup and immutable for the process lifetime.
pub struct OutputDispatcher {
    config: DispatcherConfig,
    sinks: HashMap<OutputMode, Box<dyn OutputSink>>,
}

impl OutputDispatcher {
    /// Create a dispatcher with custom sink handlers (for testing)
    pub fn with_sinks(
        config: DispatcherConfig,
        sinks: HashMap<OutputMode, Box<dyn OutputSink>>,
    ) -> Self {
        Self { config, sinks }
    }

    /// Number of initialized sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Dispatch one batch to every configured destination
    ///
    /// The batch is validated before any sink is attempted; a shape failure
    /// rejects the whole call without partial dispatch. Per-sink failures
    /// are recorded in the summary and never abort the remaining modes.
    ///
    /// # Errors
    /// [`DispatcherError::Contract`] wrapping `InvalidBatch` when the batch
    /// fails shape validation.
    #[instrument(name = "dispatcher_send", skip(self, batch), fields(batch_len = batch.len()))]
    pub async fn send(&mut self, batch: &[Message]) -> Result<DispatchSummary, DispatcherError> {
        validate_batch_shape(batch)?;

        let mut summary = DispatchSummary::default();

        if self.config.paper_trading_enabled {
            let target = self.config.paper_trading_mode.clone();
            debug!(mode = %target, "paper trading enabled, overriding configured modes");
            match OutputMode::from_str(&target) {
                Ok(mode) => {
                    self.dispatch_to(mode, batch, &mut summary).await;
                    let status = if summary.failed() == 0 { "success" } else { "failure" };
                    record_paper_trade(mode.as_str(), status);
                }
                Err(_) => {
                    warn!(mode = %target, "invalid paper trading output mode");
                    summary.skipped += 1;
                }
            }
            return Ok(summary);
        }

        let modes = self.config.modes.clone();
        for raw in &modes {
            match OutputMode::from_str(raw) {
                Ok(mode) => self.dispatch_to(mode, batch, &mut summary).await,
                Err(_) => {
                    warn!(mode = %raw, "unhandled output mode, skipping");
                    summary.skipped += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Invoke one sink and record the outcome
    async fn dispatch_to(&mut self, mode: OutputMode, batch: &[Message], summary: &mut DispatchSummary) {
        let Some(sink) = self.sinks.get_mut(&mode) else {
            warn!(mode = %mode, "no sink initialized for mode, skipping");
            summary.skipped += 1;
            return;
        };

        let start = Instant::now();
        let result = sink.write(batch).await;
        let duration = start.elapsed();

        match result {
            Ok(()) => {
                record_dispatch_outcome(mode.as_str(), "success", duration.as_secs_f64());
                debug!(sink = %mode, duration_ms = duration.as_millis() as u64, "sink write ok");
                summary.outcomes.push(SinkOutcome {
                    mode,
                    success: true,
                    duration,
                });
            }
            Err(err) => {
                record_dispatch_outcome(mode.as_str(), "failure", duration.as_secs_f64());
                error!(sink = %mode, error = %err, "sink write failed");
                summary.outcomes.push(SinkOutcome {
                    mode,
                    success: false,
                    duration,
                });
            }
        }
    }
}

impl Processor for OutputDispatcher {
    /// Dispatch is the processing callback: a validation failure rejects
    /// the message, recorded sink failures do not.
    async fn process(&mut self, batch: &[Message]) -> Result<(), ContractError> {
        self.send(batch).await.map(|_| ()).map_err(|e| match e {
            DispatcherError::Contract(inner) => inner,
            other => ContractError::processing(other.to_string()),
        })
    }
}
