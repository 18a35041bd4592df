//! Output-side contracts - modes, sinks, republish
//!
//! `OutputMode` is a closed enumeration: unknown strings are a
//! configuration error, never a runtime fork.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ContractError, Message, QueueBackend};

/// Output destinations for processed data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Queue,
    Log,
    Stdout,
    Rest,
    S3,
    Database,
}

impl OutputMode {
    /// All modes, in declaration order
    pub const ALL: [OutputMode; 6] = [
        Self::Queue,
        Self::Log,
        Self::Stdout,
        Self::Rest,
        Self::S3,
        Self::Database,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Log => "log",
            Self::Stdout => "stdout",
            Self::Rest => "rest",
            Self::S3 => "s3",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(Self::Queue),
            "log" => Ok(Self::Log),
            "stdout" => Ok(Self::Stdout),
            "rest" => Ok(Self::Rest),
            "s3" => Ok(Self::S3),
            "database" => Ok(Self::Database),
            other => Err(ContractError::config_validation(
                "output mode",
                format!("unknown output mode '{other}'"),
            )),
        }
    }
}

/// Publish route override (used by the paper-trading queue destination)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTarget {
    /// Queue name / routing key override
    pub queue: Option<String>,
    /// Exchange override (AMQP only)
    pub exchange: Option<String>,
}

/// Data output trait
///
/// All sink implementations must implement this trait. Sinks are held as
/// trait objects by the dispatcher, keyed by [`OutputMode`].
#[async_trait]
pub trait OutputSink: Send {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one batch
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, batch: &[Message]) -> Result<(), ContractError>;
}

/// Republish interface back onto the broker
///
/// The default route comes from the broker configuration; the paper-trading
/// destination may override it per call.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Backend this publisher targets
    fn backend(&self) -> QueueBackend;

    /// Publish a batch, one queue item per message
    ///
    /// # Errors
    /// Returns [`ContractError::Publish`] on connection or send failure.
    async fn publish(
        &self,
        batch: &[Message],
        route: Option<&RouteTarget>,
    ) -> Result<(), ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        for mode in OutputMode::ALL {
            assert_eq!(mode.as_str().parse::<OutputMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_unknown_mode_is_config_error() {
        let err = "kafka".parse::<OutputMode>().unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
        assert!(err.to_string().contains("kafka"));
    }

    #[test]
    fn test_mode_serde_uses_snake_case() {
        let mode: OutputMode = serde_json::from_str("\"s3\"").unwrap();
        assert_eq!(mode, OutputMode::S3);
        assert_eq!(serde_json::to_string(&OutputMode::Stdout).unwrap(), "\"stdout\"");
    }
}
