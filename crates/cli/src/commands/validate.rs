//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::ServiceBlueprint;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    backend: String,
    batch_size: usize,
    mode_count: usize,
    paper_trading: bool,
    rate_limited: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    backend: blueprint.broker.backend.to_string(),
                    batch_size: blueprint.broker.batch_size,
                    mode_count: blueprint.outputs.modes.len(),
                    paper_trading: blueprint.outputs.paper_trading.enabled,
                    rate_limited: blueprint.rate_limit.is_some(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ServiceBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.outputs.modes.is_empty() && !blueprint.outputs.paper_trading.enabled {
        warnings.push("No output modes configured - processed messages will be dropped".to_string());
    }

    if blueprint.outputs.paper_trading.enabled {
        warnings.push(format!(
            "Paper trading is enabled - all output redirected to '{}'",
            blueprint.outputs.paper_trading.mode
        ));
    }

    if blueprint.broker.wait_seconds == 0.0 {
        warnings.push("broker.wait_seconds is 0 - the consumer will busy-poll".to_string());
    }

    if blueprint.rate_limit.is_none() {
        warnings.push("No rate limit configured - outbound calls are unthrottled".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Backend: {}", summary.backend);
            println!("  Batch size: {}", summary.batch_size);
            println!("  Output modes: {}", summary.mode_count);
            println!("  Paper trading: {}", summary.paper_trading);
            println!("  Rate limited: {}", summary.rate_limited);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_validate_good_config() {
        let (_dir, path) = write_config(
            r#"
[broker]
backend = "rabbitmq"

[broker.rabbitmq]
username = "guest"
password = "guest"
queue = "market-data"

[outputs]
modes = ["log"]
"#,
        );
        let args = ValidateArgs { config: path, json: false };
        let result = validate_config(&args);
        assert!(result.valid, "error: {:?}", result.error);
        assert_eq!(result.summary.unwrap().backend, "rabbitmq");
    }

    #[test]
    fn test_validate_bad_mode() {
        let (_dir, path) = write_config(
            r#"
[broker]
backend = "rabbitmq"

[broker.rabbitmq]
username = "guest"
password = "guest"
queue = "market-data"

[outputs]
modes = ["fax"]
"#,
        );
        let args = ValidateArgs { config: path, json: false };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("fax"));
    }

    #[test]
    fn test_validate_missing_file() {
        let args = ValidateArgs {
            config: PathBuf::from("/nonexistent/config.toml"),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
    }
}
