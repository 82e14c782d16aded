//! # Relay Module
//!
//! At-least-best-effort delivery of normalized events to the downstream
//! endpoint.
//!
//! - [`RetryPolicy`]: attempt budget, jitter window and retry pause
//! - [`RelayClient`]: the HTTP seam, with [`HttpRelayClient`] as the
//!   production implementation
//! - [`ReliableForwarder`]: the attempt loop
//! - [`ForwardTracker`]: owns in-flight forwards so shutdown can drain them
//!
//! A forward never surfaces an error to the webhook caller. Its outcome is
//! logged and reported through [`ForwardReport`].

use serde_json::Value;

mod client;
mod forwarder;
mod retry;
mod tracker;

pub use client::{
    parse_downstream_url, HttpRelayClient, RelayClient, RelayError, RelayResponse,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use forwarder::{
    ForwardAttempt, ForwardObserver, ForwardReport, ForwardResult, ReliableForwarder,
};
pub use retry::RetryPolicy;
pub use tracker::{DrainSummary, ForwardTracker};

// ============================================================================
// Attempt Classification
// ============================================================================

/// Outcome of a single relay attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RecoverableFailure(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RecoverableFailure(_) => "failure",
        }
    }
}

/// Classify a downstream reply body
///
/// - JSON with a truthy `success` field: success
/// - JSON with a missing or falsy `success` field: failure, reason taken from
///   the `error` field when present
/// - anything that is not JSON: success
///
/// # Examples
///
/// ```rust
/// use esign_relay_core::relay::{classify_response, AttemptOutcome};
///
/// assert_eq!(classify_response(r#"{"success":true}"#), AttemptOutcome::Success);
/// assert_eq!(classify_response("OK"), AttemptOutcome::Success);
/// assert_eq!(
///     classify_response(r#"{"success":false,"error":"quota"}"#),
///     AttemptOutcome::RecoverableFailure("quota".to_string())
/// );
/// ```
pub fn classify_response(text: &str) -> AttemptOutcome {
    let Ok(reply) = serde_json::from_str::<Value>(text) else {
        return AttemptOutcome::Success;
    };

    if reply.get("success").is_some_and(is_truthy) {
        return AttemptOutcome::Success;
    }

    let reason = match reply.get("error") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        Some(Value::Null) | None => "downstream reported failure".to_string(),
        Some(other) => other.to_string(),
    };
    AttemptOutcome::RecoverableFailure(reason)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
