//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use contracts::ServiceBlueprint;

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref host) = args.broker_host {
        if let Some(ref mut rabbitmq) = blueprint.broker.rabbitmq {
            info!(host = %host, "Overriding broker host from CLI");
            rabbitmq.host = host.clone();
        }
    }
    if let Some(port) = args.broker_port {
        if let Some(ref mut rabbitmq) = blueprint.broker.rabbitmq {
            info!(port = %port, "Overriding broker port from CLI");
            rabbitmq.port = port;
        }
    }
    if args.batch_size > 0 {
        info!(batch_size = args.batch_size, "Overriding batch size from CLI");
        blueprint.broker.batch_size = args.batch_size;
    }

    info!(
        backend = %blueprint.broker.backend,
        batch_size = blueprint.broker.batch_size,
        modes = ?blueprint.outputs.modes,
        paper_trading = blueprint.outputs.paper_trading.enabled,
        "Configuration loaded"
    );

    log_output_config(&blueprint);

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
    };

    // Cooperative shutdown: SIGINT/SIGTERM cancel the token, the consumer
    // finishes its in-flight batch and closes the connection
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("Shutdown signal received, stopping listener");
        signal_token.cancel();
    });

    info!("Starting pipeline...");
    let pipeline = Pipeline::new(pipeline_config);
    let stats = pipeline
        .run(shutdown)
        .await
        .context("Pipeline execution failed")?;

    info!(
        messages_acked = stats.messages_acked,
        messages_rejected = stats.messages_rejected,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("qflow finished");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Log the enabled output destinations with redacted endpoints
fn log_output_config(blueprint: &ServiceBlueprint) {
    let outputs = &blueprint.outputs;
    let redact = blueprint.service.redact_payloads;

    info!(modes = ?outputs.modes, "Output modes enabled");

    if let Some(ref rest) = outputs.rest {
        info!(url = %redacted(&rest.url, redact), "REST output configured");
    }
    if let Some(ref s3) = outputs.s3 {
        info!(
            bucket = %redacted(&s3.bucket, redact),
            prefix = %s3.prefix,
            "Object-store output configured"
        );
    }
    if let Some(ref database) = outputs.database {
        info!(
            connection = %redacted(&database.connection_string, redact),
            "Database output configured"
        );
    }
    if outputs.paper_trading.enabled {
        info!(
            mode = %outputs.paper_trading.mode,
            "Paper trading enabled - all output redirected"
        );
    }
}

fn redacted(value: &str, redact: bool) -> &str {
    if redact {
        "[redacted]"
    } else {
        value
    }
}
