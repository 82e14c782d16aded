//! # Canonical Event
//!
//! The one value that crosses from the inbound path to the forward path.
//!
//! An [`Event`] wraps the JSON document exactly as the provider sent it and
//! guarantees that `event.event_type` is a non-empty string. The document is
//! never reshaped: serializing an event writes the original fields back out,
//! which is what the downstream relay expects.

use crate::webhook::NormalizeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Event type the provider uses for its endpoint verification probe
pub const CALLBACK_TEST_EVENT: &str = "callback_test";

/// Canonical webhook event
///
/// Construct with [`Event::from_document`]; there is no way to build an
/// event without a type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: String,
    document: Value,
}

impl Event {
    /// Validate a parsed JSON document and wrap it as an event
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::MalformedEnvelope`] when:
    /// - the document is not a JSON object
    /// - the `event` field is missing or not an object
    /// - `event.event_type` is missing, not a string, or empty
    pub fn from_document(document: Value) -> Result<Self, NormalizeError> {
        let root = document
            .as_object()
            .ok_or_else(|| NormalizeError::malformed("document is not a JSON object"))?;

        let event = root
            .get("event")
            .ok_or_else(|| NormalizeError::malformed("missing `event` field"))?
            .as_object()
            .ok_or_else(|| NormalizeError::malformed("`event` is not an object"))?;

        let event_type = event
            .get("event_type")
            .and_then(Value::as_str)
            .ok_or_else(|| NormalizeError::malformed("missing `event.event_type`"))?;

        if event_type.is_empty() {
            return Err(NormalizeError::malformed("empty `event.event_type`"));
        }

        Ok(Self {
            event_type: event_type.to_string(),
            document,
        })
    }

    /// Minimal verification-probe event with no data
    ///
    /// Used when a multipart body names the probe but carries no parsable JSON.
    pub fn callback_test() -> Self {
        let mut event = Map::new();
        event.insert(
            "event_type".to_string(),
            Value::String(CALLBACK_TEST_EVENT.to_string()),
        );

        let mut root = Map::new();
        root.insert("event".to_string(), Value::Object(event));

        Self {
            event_type: CALLBACK_TEST_EVENT.to_string(),
            document: Value::Object(root),
        }
    }

    /// Event type tag, never empty
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Whether this is the provider's verification probe
    pub fn is_callback_test(&self) -> bool {
        self.event_type == CALLBACK_TEST_EVENT
    }

    /// The `event.event_data` object, if present
    pub fn event_data(&self) -> Option<&Map<String, Value>> {
        self.event_field("event_data").and_then(Value::as_object)
    }

    /// Challenge token carried by a verification probe
    ///
    /// Empty strings count as absent. Numeric tokens are rendered as their
    /// JSON text so they can be echoed back unchanged.
    pub fn challenge(&self) -> Option<String> {
        match self.event_data()?.get("challenge")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Provider timestamp of the event (`event.event_time`), if present
    pub fn event_time(&self) -> Option<&str> {
        self.event_field("event_time").and_then(Value::as_str)
    }

    /// Provider hash of the event (`event.event_hash`), if present
    pub fn event_hash(&self) -> Option<&str> {
        self.event_field("event_hash").and_then(Value::as_str)
    }

    /// Full document as received
    pub fn document(&self) -> &Value {
        &self.document
    }

    fn event_field(&self, name: &str) -> Option<&Value> {
        self.document.get("event")?.get(name)
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.document.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = Value::deserialize(deserializer)?;
        Self::from_document(document).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
