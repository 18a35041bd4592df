//! Configuration parsing
//!
//! Supports TOML (primary) and JSON (secondary) formats.

use contracts::{ContractError, ServiceBlueprint};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format (recommended)
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse a TOML configuration
pub fn parse_toml(content: &str) -> Result<ServiceBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse a JSON configuration
pub fn parse_json(content: &str) -> Result<ServiceBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse configuration content in the given format
pub fn parse(content: &str, format: ConfigFormat) -> Result<ServiceBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::QueueBackend;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[broker]
backend = "rabbitmq"

[broker.rabbitmq]
username = "guest"
password = "guest"
queue = "market-data"

[outputs]
modes = ["log"]
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let blueprint = result.unwrap();
        assert_eq!(blueprint.broker.backend, QueueBackend::Rabbitmq);
        assert_eq!(blueprint.broker.batch_size, 10);
        assert_eq!(blueprint.outputs.modes, vec!["log".to_string()]);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "broker": {
                "backend": "sqs",
                "sqs": {
                    "queue_url": "https://sqs.us-west-2.amazonaws.com/123/market-data",
                    "region": "us-west-2"
                }
            },
            "outputs": { "modes": ["log", "stdout"] }
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        assert_eq!(result.unwrap().broker.backend, QueueBackend::Sqs);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_backend_fails_parse() {
        let content = r#"
[broker]
backend = "kafka"

[outputs]
modes = ["log"]
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
