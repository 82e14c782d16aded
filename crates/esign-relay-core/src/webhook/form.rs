//! URL-encoded form bodies carrying the event JSON in a single field.

use super::NormalizeError;
use serde_json::Value;

/// Form field holding the event JSON
pub const JSON_FIELD: &str = "json";

/// Decode a form body and parse the first non-empty `json` field as JSON
pub(crate) fn parse_json_field(body: &[u8]) -> Result<Value, NormalizeError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(body).map_err(|e| NormalizeError::InvalidForm {
            message: e.to_string(),
        })?;

    let json = pairs
        .into_iter()
        .find(|(key, _)| key == JSON_FIELD)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| NormalizeError::MissingFormField {
            field: JSON_FIELD.to_string(),
        })?;

    serde_json::from_str(&json).map_err(NormalizeError::invalid_json)
}

#[cfg(test)]
#[path = "form_tests.rs"]
mod tests;
