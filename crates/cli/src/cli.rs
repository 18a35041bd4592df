//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// qflow - queue consumption and output dispatch pipeline
#[derive(Parser, Debug)]
#[command(
    name = "qflow",
    author,
    version,
    about = "Queue consumption and output dispatch pipeline",
    long_about = "A message-consumption and output-dispatch pipeline for data-polling services.\n\n\
                  Pulls batches of messages from RabbitMQ or SQS, applies the configured \n\
                  output routing (queue, log, stdout, REST, S3, database), and recovers \n\
                  from transient failures with bounded backoff."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "QFLOW_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "QFLOW_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the consumption pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "QFLOW_CONFIG")]
    pub config: PathBuf,

    /// Override broker host from configuration (RabbitMQ backend)
    #[arg(long, env = "QFLOW_BROKER_HOST")]
    pub broker_host: Option<String>,

    /// Override broker port from configuration (RabbitMQ backend)
    #[arg(long, env = "QFLOW_BROKER_PORT")]
    pub broker_port: Option<u16>,

    /// Override batch size from configuration (0 = use configured value)
    #[arg(long, default_value = "0", env = "QFLOW_BATCH_SIZE")]
    pub batch_size: usize,

    /// Pipeline timeout in seconds (0 = run until shutdown signal)
    #[arg(long, default_value = "0", env = "QFLOW_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without consuming
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9100", env = "QFLOW_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
