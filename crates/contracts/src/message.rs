//! Message - the unit of work flowing through the pipeline
//!
//! An ordered mapping of string keys to JSON values, immutable once
//! received. Owned by the consumer loop until handed to the processing
//! callback, then by the dispatcher until terminal dispatch.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ContractError;

/// Key carrying the instrument identifier
pub const SYMBOL_KEY: &str = "symbol";

/// Key carrying the event timestamp
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Key carrying the payload body
pub const BODY_KEY: &str = "data";

/// A single decoded queue message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    /// Wrap an already-decoded field map
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Decode a raw UTF-8 JSON body
    ///
    /// # Errors
    /// Returns [`ContractError::Decode`] when the body is not a JSON object.
    pub fn from_slice(body: &[u8]) -> Result<Self, ContractError> {
        serde_json::from_slice(body).map_err(|e| ContractError::decode("message body", e.to_string()))
    }

    /// Encode back to the wire format (one JSON object per queue item)
    ///
    /// # Errors
    /// Returns [`ContractError::Decode`] when serialization fails.
    pub fn to_bytes(&self) -> Result<Bytes, ContractError> {
        serde_json::to_vec(&self.0)
            .map(Bytes::from)
            .map_err(|e| ContractError::decode("message encode", e.to_string()))
    }

    /// Field lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Instrument identifier, if present as a string
    pub fn symbol(&self) -> Option<&str> {
        self.get(SYMBOL_KEY).and_then(Value::as_str)
    }

    /// Event timestamp, if present as a string
    pub fn timestamp(&self) -> Option<&str> {
        self.get(TIMESTAMP_KEY).and_then(Value::as_str)
    }

    /// Payload body, if present
    pub fn body(&self) -> Option<&Value> {
        self.get(BODY_KEY).filter(|v| !v.is_null())
    }

    /// True when identifier and timestamp are both present and non-null
    pub fn is_well_formed(&self) -> bool {
        self.symbol().is_some() && self.timestamp().is_some()
    }

    /// True when the payload body is present
    pub fn has_body(&self) -> bool {
        self.body().is_some()
    }

    /// Underlying ordered field map
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Validate the shape expected by the output dispatcher: a sequence of
/// key-value records each carrying a payload body.
///
/// # Errors
/// Returns [`ContractError::InvalidBatch`] naming the first offending record.
pub fn validate_batch_shape(batch: &[Message]) -> Result<(), ContractError> {
    for (idx, message) in batch.iter().enumerate() {
        if !message.has_body() {
            return Err(ContractError::invalid_batch(format!(
                "record {idx} is missing the '{BODY_KEY}' field"
            )));
        }
    }
    Ok(())
}

/// Broker-specific acknowledgment token, bound 1:1 to a message within a
/// batch and consumed exactly once by either an acknowledge or a reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryHandle {
    /// AMQP delivery tag
    Amqp { delivery_tag: u64 },
    /// Pull-queue receipt handle
    PullQueue { receipt_handle: String },
}

/// A message together with its acknowledgment token
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub handle: DeliveryHandle,
}

/// An ordered sequence of deliveries from one poll/receive call
pub type Batch = Vec<Delivery>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Message {
        serde_json::from_value(json!({
            "symbol": "AAPL",
            "timestamp": "2025-06-01T12:00:00Z",
            "data": { "price": 187.5, "volume": 1200 }
        }))
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let message = sample();
        assert_eq!(message.symbol(), Some("AAPL"));
        assert_eq!(message.timestamp(), Some("2025-06-01T12:00:00Z"));
        assert!(message.has_body());
        assert!(message.is_well_formed());
    }

    #[test]
    fn test_missing_fields() {
        let message: Message = serde_json::from_value(json!({ "data": {} })).unwrap();
        assert!(!message.is_well_formed());
        assert!(message.has_body());

        let message: Message =
            serde_json::from_value(json!({ "symbol": "X", "timestamp": "t" })).unwrap();
        assert!(message.is_well_formed());
        assert!(!message.has_body());
    }

    #[test]
    fn test_null_body_is_absent() {
        let message: Message = serde_json::from_value(json!({ "data": null })).unwrap();
        assert!(!message.has_body());
    }

    #[test]
    fn test_from_slice_rejects_non_object() {
        assert!(Message::from_slice(b"[1, 2, 3]").is_err());
        assert!(Message::from_slice(b"not json").is_err());
        assert!(Message::from_slice(br#"{"symbol": "X"}"#).is_ok());
    }

    #[test]
    fn test_wire_round_trip() {
        let message = sample();
        let bytes = message.to_bytes().unwrap();
        let decoded = Message::from_slice(&bytes).unwrap();
        assert_eq!(message, decoded);
    }

    #[test]
    fn test_key_order_preserved() {
        let message = Message::from_slice(br#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<&str> = message.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_validate_batch_shape() {
        let good = sample();
        let bad: Message = serde_json::from_value(json!({ "symbol": "X" })).unwrap();

        assert!(validate_batch_shape(&[good.clone(), good.clone()]).is_ok());
        assert!(validate_batch_shape(&[]).is_ok());

        let err = validate_batch_shape(&[good, bad]).unwrap_err();
        assert!(matches!(err, ContractError::InvalidBatch { .. }));
        assert!(err.to_string().contains("record 1"));
    }
}
