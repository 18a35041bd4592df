//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce a `ServiceBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("Backend: {}", blueprint.broker.backend);
//! ```

mod parser;
mod validator;

pub use contracts::ServiceBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file path
    ///
    /// Automatically detects format from the file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ServiceBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from a string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ServiceBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize a ServiceBlueprint to a TOML string
    pub fn to_toml(blueprint: &ServiceBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize a ServiceBlueprint to a JSON string
    pub fn to_json(blueprint: &ServiceBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ServiceBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[broker]
backend = "rabbitmq"
batch_size = 5

[broker.rabbitmq]
host = "mq.internal"
username = "poller"
password = "secret"
queue = "market-data"

[outputs]
modes = ["log", "stdout"]

[outputs.paper_trading]
enabled = false

[rate_limit]
max_requests = 30
window_seconds = 60.0
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let blueprint = result.unwrap();
        assert_eq!(blueprint.broker.batch_size, 5);
        assert_eq!(blueprint.rate_limit.unwrap().max_requests, 30);
    }

    #[test]
    fn test_round_trip_toml() {
        let blueprint = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&blueprint).unwrap();
        let reparsed = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.broker.backend, reparsed.broker.backend);
        assert_eq!(blueprint.outputs.modes, reparsed.outputs.modes);
    }

    #[test]
    fn test_round_trip_json() {
        let blueprint = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let reparsed = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(blueprint.broker.backend, reparsed.broker.backend);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        // Unknown output mode should fail validation, not parsing
        let content = r#"
[broker]
backend = "rabbitmq"

[broker.rabbitmq]
username = "guest"
password = "guest"
queue = "market-data"

[outputs]
modes = ["log", "morse"]
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("morse"));
    }
}
