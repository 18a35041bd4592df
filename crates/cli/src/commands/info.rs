//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{QueueBackend, ServiceBlueprint};

use crate::cli::InfoArgs;

/// Configuration information for display
#[derive(Serialize)]
struct ConfigInfo {
    service: String,
    backend: String,
    source: String,
    batch_size: usize,
    wait_seconds: f64,
    output_modes: Vec<String>,
    paper_trading: bool,
    paper_trading_mode: Option<String>,
    rate_limit: Option<String>,
    redact_payloads: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Reading configuration");

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let config_info = build_info(&blueprint);

    if args.json {
        let json =
            serde_json::to_string_pretty(&config_info).context("Failed to serialize info")?;
        println!("{}", json);
    } else {
        print_info(&config_info);
    }

    Ok(())
}

fn build_info(blueprint: &ServiceBlueprint) -> ConfigInfo {
    let source = match blueprint.broker.backend {
        QueueBackend::Rabbitmq => blueprint
            .broker
            .rabbitmq
            .as_ref()
            .map(|c| format!("{}:{} queue '{}'", c.host, c.port, c.queue))
            .unwrap_or_else(|| "<unconfigured>".to_string()),
        QueueBackend::Sqs => blueprint
            .broker
            .sqs
            .as_ref()
            .map(|c| format!("{} ({})", c.queue_url, c.region))
            .unwrap_or_else(|| "<unconfigured>".to_string()),
    };

    let paper = &blueprint.outputs.paper_trading;

    ConfigInfo {
        service: blueprint.service.name.clone(),
        backend: blueprint.broker.backend.to_string(),
        source,
        batch_size: blueprint.broker.batch_size,
        wait_seconds: blueprint.broker.wait_seconds,
        output_modes: blueprint.outputs.modes.clone(),
        paper_trading: paper.enabled,
        paper_trading_mode: paper.enabled.then(|| paper.mode.clone()),
        rate_limit: blueprint
            .rate_limit
            .as_ref()
            .map(|l| format!("{} requests / {:.0}s", l.max_requests, l.window_seconds)),
        redact_payloads: blueprint.service.redact_payloads,
    }
}

fn print_info(config_info: &ConfigInfo) {
    println!("\n=== Configuration ===\n");
    println!("Service: {}", config_info.service);
    println!("Broker:");
    println!("  Backend: {}", config_info.backend);
    println!("  Source: {}", config_info.source);
    println!("  Batch size: {}", config_info.batch_size);
    println!("  Poll wait: {:.1}s", config_info.wait_seconds);

    println!("\nOutputs ({}):", config_info.output_modes.len());
    for mode in &config_info.output_modes {
        println!("  - {}", mode);
    }

    if config_info.paper_trading {
        println!(
            "\nPaper trading: enabled -> {}",
            config_info.paper_trading_mode.as_deref().unwrap_or("?")
        );
    }

    if let Some(ref limit) = config_info.rate_limit {
        println!("\nRate limit: {}", limit);
    }

    println!("Redact payloads in logs: {}", config_info.redact_payloads);
    println!();
}
