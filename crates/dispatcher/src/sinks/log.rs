//! LogSink - emits each message via tracing
//!
//! Never touches the network; always succeeds.

use async_trait::async_trait;
use tracing::info;

use contracts::{ContractError, Message, OutputSink};

/// Sink that logs each processed message
pub struct LogSink {
    redact: bool,
}

impl LogSink {
    /// With `redact` true, payloads are replaced by a placeholder; they
    /// still flow to other sinks untouched.
    pub fn new(redact: bool) -> Self {
        Self { redact }
    }
}

#[async_trait]
impl OutputSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn write(&mut self, batch: &[Message]) -> Result<(), ContractError> {
        for message in batch {
            let symbol = message.symbol().unwrap_or("<unknown>");
            let timestamp = message.timestamp().unwrap_or("<unknown>");

            if self.redact {
                info!(symbol, timestamp, payload = "[redacted]", "processed message");
            } else {
                let rendered = serde_json::to_string(message.fields())
                    .map_err(|e| ContractError::sink_write("log", e.to_string()))?;
                info!(symbol, timestamp, payload = %rendered, "processed message");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> Message {
        serde_json::from_value(json!({
            "symbol": "AAPL",
            "timestamp": "2025-06-01T12:00:00Z",
            "data": { "price": 187.5 }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_log_sink_always_succeeds() {
        let mut sink = LogSink::new(true);
        assert!(sink.write(&[message(), message()]).await.is_ok());

        let mut unredacted = LogSink::new(false);
        assert!(unredacted.write(&[message()]).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_empty_batch() {
        let mut sink = LogSink::new(true);
        assert!(sink.write(&[]).await.is_ok());
    }
}
