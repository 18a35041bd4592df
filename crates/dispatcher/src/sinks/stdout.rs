//! StdoutSink - prints each message to standard output
//!
//! Never touches the network; always succeeds.

use async_trait::async_trait;

use contracts::{ContractError, Message, OutputSink};

/// Sink that prints each processed message as pretty JSON
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OutputSink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn write(&mut self, batch: &[Message]) -> Result<(), ContractError> {
        for message in batch {
            let rendered = serde_json::to_string_pretty(message.fields())
                .map_err(|e| ContractError::sink_write("stdout", e.to_string()))?;
            println!("{rendered}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_stdout_sink_write() {
        let message: Message = serde_json::from_value(json!({
            "symbol": "MSFT",
            "timestamp": "2025-06-01T12:00:00Z",
            "data": {}
        }))
        .unwrap();

        let mut sink = StdoutSink::new();
        assert!(sink.write(&[message]).await.is_ok());
        assert_eq!(sink.name(), "stdout");
    }
}
