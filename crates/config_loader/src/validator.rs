//! Configuration validation
//!
//! Rules:
//! - backend section present for the selected backend
//! - batch_size >= 1, wait_seconds >= 0
//! - every output mode parses against the closed enumeration
//! - mode-specific sections present (rest/s3/database)
//! - paper-trading target parses
//! - rate limit parameters positive

use std::str::FromStr;

use contracts::{ContractError, OutputMode, QueueBackend, ServiceBlueprint};

/// Validate a ServiceBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    validate_broker(blueprint)?;
    validate_output_modes(blueprint)?;
    validate_sink_sections(blueprint)?;
    validate_paper_trading(blueprint)?;
    validate_rate_limit(blueprint)?;
    Ok(())
}

/// Backend section presence and consumption bounds
fn validate_broker(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let broker = &blueprint.broker;

    if broker.batch_size == 0 {
        return Err(ContractError::config_validation(
            "broker.batch_size",
            "batch_size must be >= 1",
        ));
    }
    if broker.wait_seconds < 0.0 {
        return Err(ContractError::config_validation(
            "broker.wait_seconds",
            format!("wait_seconds must be >= 0, got {}", broker.wait_seconds),
        ));
    }

    match broker.backend {
        QueueBackend::Rabbitmq => {
            let config = broker.rabbitmq.as_ref().ok_or_else(|| {
                ContractError::config_validation(
                    "broker.rabbitmq",
                    "rabbitmq backend selected but [broker.rabbitmq] is missing",
                )
            })?;
            if config.queue.is_empty() {
                return Err(ContractError::config_validation(
                    "broker.rabbitmq.queue",
                    "queue name cannot be empty",
                ));
            }
            if config.host.is_empty() {
                return Err(ContractError::config_validation(
                    "broker.rabbitmq.host",
                    "host cannot be empty",
                ));
            }
        }
        QueueBackend::Sqs => {
            let config = broker.sqs.as_ref().ok_or_else(|| {
                ContractError::config_validation(
                    "broker.sqs",
                    "sqs backend selected but [broker.sqs] is missing",
                )
            })?;
            if config.queue_url.is_empty() {
                return Err(ContractError::config_validation(
                    "broker.sqs.queue_url",
                    "queue_url cannot be empty",
                ));
            }
            if config.region.is_empty() {
                return Err(ContractError::config_validation(
                    "broker.sqs.region",
                    "region cannot be empty",
                ));
            }
        }
    }

    Ok(())
}

/// Every configured mode must be a member of the closed enumeration
fn validate_output_modes(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    for (idx, raw) in blueprint.outputs.modes.iter().enumerate() {
        OutputMode::from_str(raw).map_err(|_| {
            ContractError::config_validation(
                format!("outputs.modes[{idx}]"),
                format!("unknown output mode '{raw}'"),
            )
        })?;
    }
    Ok(())
}

/// Mode-specific sections must exist for every mode that needs one
fn validate_sink_sections(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let outputs = &blueprint.outputs;

    for mode in outputs.required_modes() {
        match mode {
            OutputMode::Rest => {
                let config = outputs.rest.as_ref().ok_or_else(|| {
                    ContractError::config_validation(
                        "outputs.rest",
                        "rest mode configured but [outputs.rest] is missing",
                    )
                })?;
                if config.url.is_empty() {
                    return Err(ContractError::config_validation(
                        "outputs.rest.url",
                        "url cannot be empty",
                    ));
                }
            }
            OutputMode::S3 => {
                let config = outputs.s3.as_ref().ok_or_else(|| {
                    ContractError::config_validation(
                        "outputs.s3",
                        "s3 mode configured but [outputs.s3] is missing",
                    )
                })?;
                if config.bucket.is_empty() {
                    return Err(ContractError::config_validation(
                        "outputs.s3.bucket",
                        "bucket cannot be empty",
                    ));
                }
            }
            OutputMode::Database => {
                let config = outputs.database.as_ref().ok_or_else(|| {
                    ContractError::config_validation(
                        "outputs.database",
                        "database mode configured but [outputs.database] is missing",
                    )
                })?;
                if config.connection_string.is_empty() {
                    return Err(ContractError::config_validation(
                        "outputs.database.connection_string",
                        "connection_string cannot be empty",
                    ));
                }
                if config.insert_sql.is_empty() {
                    return Err(ContractError::config_validation(
                        "outputs.database.insert_sql",
                        "insert_sql cannot be empty",
                    ));
                }
            }
            OutputMode::Queue | OutputMode::Log | OutputMode::Stdout => {}
        }
    }

    Ok(())
}

/// Paper-trading target must parse when the override is enabled
fn validate_paper_trading(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let paper = &blueprint.outputs.paper_trading;
    if !paper.enabled {
        return Ok(());
    }

    OutputMode::from_str(&paper.mode).map_err(|_| {
        ContractError::config_validation(
            "outputs.paper_trading.mode",
            format!("unknown output mode '{}'", paper.mode),
        )
    })?;
    Ok(())
}

/// Rate limit parameters must be positive
fn validate_rate_limit(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    if let Some(limit) = &blueprint.rate_limit {
        if limit.max_requests == 0 {
            return Err(ContractError::config_validation(
                "rate_limit.max_requests",
                "max_requests must be > 0",
            ));
        }
        if limit.window_seconds <= 0.0 {
            return Err(ContractError::config_validation(
                "rate_limit.window_seconds",
                format!("window_seconds must be > 0, got {}", limit.window_seconds),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        BrokerConfig, OutputsConfig, PaperTradingConfig, RabbitMqConfig, RateLimitConfig,
        RestSinkConfig, ServiceBlueprint, ServiceConfig,
    };

    fn minimal_blueprint() -> ServiceBlueprint {
        ServiceBlueprint {
            version: Default::default(),
            service: ServiceConfig::default(),
            broker: BrokerConfig {
                backend: QueueBackend::Rabbitmq,
                batch_size: 10,
                wait_seconds: 10.0,
                rabbitmq: Some(RabbitMqConfig {
                    host: "localhost".into(),
                    port: 5672,
                    vhost: "/".into(),
                    username: "guest".into(),
                    password: "guest".into(),
                    queue: "market-data".into(),
                    exchange: String::new(),
                    routing_key: None,
                }),
                sqs: None,
            },
            outputs: OutputsConfig {
                modes: vec!["log".into()],
                ..Default::default()
            },
            rate_limit: None,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_missing_backend_section() {
        let mut blueprint = minimal_blueprint();
        blueprint.broker.rabbitmq = None;
        let err = validate(&blueprint).unwrap_err().to_string();
        assert!(err.contains("broker.rabbitmq"), "got: {err}");
    }

    #[test]
    fn test_sqs_requires_section() {
        let mut blueprint = minimal_blueprint();
        blueprint.broker.backend = QueueBackend::Sqs;
        let err = validate(&blueprint).unwrap_err().to_string();
        assert!(err.contains("broker.sqs"), "got: {err}");
    }

    #[test]
    fn test_zero_batch_size() {
        let mut blueprint = minimal_blueprint();
        blueprint.broker.batch_size = 0;
        let err = validate(&blueprint).unwrap_err().to_string();
        assert!(err.contains("batch_size"), "got: {err}");
    }

    #[test]
    fn test_unknown_output_mode() {
        let mut blueprint = minimal_blueprint();
        blueprint.outputs.modes.push("carrier-pigeon".into());
        let err = validate(&blueprint).unwrap_err().to_string();
        assert!(err.contains("carrier-pigeon"), "got: {err}");
        assert!(err.contains("outputs.modes[1]"), "got: {err}");
    }

    #[test]
    fn test_rest_mode_requires_url() {
        let mut blueprint = minimal_blueprint();
        blueprint.outputs.modes.push("rest".into());
        let err = validate(&blueprint).unwrap_err().to_string();
        assert!(err.contains("outputs.rest"), "got: {err}");

        blueprint.outputs.rest = Some(RestSinkConfig {
            url: "http://collector:8080/ingest".into(),
            timeout_seconds: 10,
        });
        assert!(validate(&blueprint).is_ok());
    }

    #[test]
    fn test_paper_target_needs_section_too() {
        let mut blueprint = minimal_blueprint();
        blueprint.outputs.paper_trading = PaperTradingConfig {
            enabled: true,
            mode: "s3".into(),
            ..Default::default()
        };
        let err = validate(&blueprint).unwrap_err().to_string();
        assert!(err.contains("outputs.s3"), "got: {err}");
    }

    #[test]
    fn test_invalid_paper_mode() {
        let mut blueprint = minimal_blueprint();
        blueprint.outputs.paper_trading = PaperTradingConfig {
            enabled: true,
            mode: "telegraph".into(),
            ..Default::default()
        };
        let err = validate(&blueprint).unwrap_err().to_string();
        assert!(err.contains("paper_trading"), "got: {err}");
    }

    #[test]
    fn test_rate_limit_bounds() {
        let mut blueprint = minimal_blueprint();
        blueprint.rate_limit = Some(RateLimitConfig {
            max_requests: 0,
            window_seconds: 60.0,
        });
        assert!(validate(&blueprint).is_err());

        blueprint.rate_limit = Some(RateLimitConfig {
            max_requests: 5,
            window_seconds: 0.0,
        });
        assert!(validate(&blueprint).is_err());

        blueprint.rate_limit = Some(RateLimitConfig {
            max_requests: 5,
            window_seconds: 60.0,
        });
        assert!(validate(&blueprint).is_ok());
    }
}
