//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use esign_relay_core::{
    relay::RelayError,
    webhook::{ErrorKind, NormalizeError},
};
use tracing::{error, warn};

/// Reply body for an empty request
pub const EMPTY_BODY_MESSAGE: &str = "Bad Request: Empty body";

/// Reply body for every other rejected request
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Webhook handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: the request carried no body at all
/// - `500 Internal Server Error`: anything else that stopped the body from
///   becoming an event
///
/// Replies are plain text with a fixed message. The underlying cause is
/// logged server-side and never returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Body could not be normalized into an event
    #[error("Normalization failed: {0}")]
    Normalization(#[from] NormalizeError),
}

impl WebhookHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Normalization(e) if e.kind() == ErrorKind::EmptyBody => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Normalization(e) if e.kind() == ErrorKind::EmptyBody => {
                warn!("Rejected webhook with empty body");
                EMPTY_BODY_MESSAGE
            }
            Self::Normalization(e) => {
                error!(error = %e, kind = e.kind().label(), "Failed to process webhook body");
                INTERNAL_ERROR_MESSAGE
            }
        };

        (status, message).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Relay setup failed: {0}")]
    Relay(#[from] RelayError),

    #[error("Metrics initialization failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ServiceError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } | Self::Metrics(_) => 2,
            Self::Configuration(_) | Self::Relay(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration loading failed: {message}")]
    Loading { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
