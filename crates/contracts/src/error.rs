//! Layered error definitions
//!
//! Categorized by source: config / broker / decode / sink / publish

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Broker Errors =====
    /// Broker connection error
    #[error("broker '{backend}' connection error: {message}")]
    BrokerConnection { backend: String, message: String },

    /// Broker connection attempts exhausted
    #[error("broker '{backend}' connection exhausted after {attempts} attempts: {message}")]
    ConnectionExhausted {
        backend: String,
        attempts: u32,
        message: String,
    },

    /// Message body decode error
    #[error("decode error in {context}: {message}")]
    Decode { context: String, message: String },

    // ===== Processing Errors =====
    /// Per-message processing error
    #[error("processing error: {message}")]
    Processing { message: String },

    /// Batch failed shape validation before dispatch
    #[error("invalid batch: {reason}")]
    InvalidBatch { reason: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    /// Queue publish error
    #[error("publish to '{backend}' failed: {message}")]
    Publish { backend: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create broker connection error
    pub fn broker_connection(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrokerConnection {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create decode error
    pub fn decode(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create per-message processing error
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
        }
    }

    /// Create batch validation error
    pub fn invalid_batch(reason: impl Into<String>) -> Self {
        Self::InvalidBatch {
            reason: reason.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create queue publish error
    pub fn publish(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            backend: backend.into(),
            message: message.into(),
        }
    }
}
