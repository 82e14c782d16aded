//! # Webhook Normalization Module
//!
//! Turns a raw inbound webhook into a canonical [`Event`].
//!
//! The provider sends the same logical event in three encodings: its test
//! button posts `multipart/form-data` or `application/x-www-form-urlencoded`
//! with the JSON in a `json` field, while real deliveries post raw
//! `application/json`. [`BodyNormalizer`] dispatches on the declared content
//! type and reduces all three to the same event, or to a typed
//! [`NormalizeError`].

use crate::{Event, Timestamp};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

mod classifier;
mod form;
mod multipart;

pub use classifier::{EventClassifier, ReplyDecision, ACKNOWLEDGEMENT};
pub use form::JSON_FIELD;
pub use multipart::{extract_boundary, BraceScanExtractor, MultipartExtractor};

use crate::event::CALLBACK_TEST_EVENT;

// ============================================================================
// Core Types
// ============================================================================

/// Raw inbound request captured before any parsing
///
/// The full body is buffered; nothing downstream parses a partial stream.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub content_type: Option<String>,
    pub body: Bytes,
    pub received_at: Timestamp,
}

impl RawRequest {
    /// Capture a new raw request
    pub fn new(content_type: Option<String>, body: Bytes) -> Self {
        Self {
            content_type,
            body,
            received_at: Timestamp::now(),
        }
    }

    /// Whether the request carried no bytes at all
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Time spent since the request was captured
    pub fn elapsed(&self) -> Duration {
        Timestamp::now().duration_since(self.received_at)
    }
}

/// Result of normalizing one request body
pub type ParseOutcome = Result<Event, NormalizeError>;

/// Wire encoding declared by the `Content-Type` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    /// `multipart/form-data`, with the boundary parameter if one was declared
    Multipart { boundary: Option<String> },
    /// `application/json`
    Json,
    /// `application/x-www-form-urlencoded`
    FormUrlEncoded,
    /// Anything else, including a missing header
    Unsupported(String),
}

impl ContentKind {
    /// Classify a content-type header by case-insensitive prefix
    pub fn from_header(content_type: Option<&str>) -> Self {
        let raw = content_type.unwrap_or("").trim();
        let lowered = raw.to_ascii_lowercase();

        if lowered.starts_with("multipart/form-data") {
            Self::Multipart {
                boundary: extract_boundary(raw),
            }
        } else if lowered.starts_with("application/json") {
            Self::Json
        } else if lowered.starts_with("application/x-www-form-urlencoded") {
            Self::FormUrlEncoded
        } else {
            Self::Unsupported(raw.to_string())
        }
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Multipart { .. } => "multipart",
            Self::Json => "json",
            Self::FormUrlEncoded => "form_urlencoded",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Coarse classification of normalization failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No bytes received
    EmptyBody,
    /// Content type absent or not one of the recognized encodings
    UnsupportedContentType,
    /// Recognized encoding but the payload could not be turned into an event
    MalformedPayload,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::EmptyBody => "empty_body",
            Self::UnsupportedContentType => "unsupported_content_type",
            Self::MalformedPayload => "malformed_payload",
        }
    }
}

/// Errors turning a raw body into an event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("Request body is empty")]
    EmptyBody,

    #[error("Unsupported content-type: {content_type:?}")]
    UnsupportedContentType { content_type: String },

    #[error("Multipart content-type has no boundary parameter")]
    MissingBoundary,

    #[error("No JSON in multipart body")]
    NoJsonInMultipart,

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Invalid form body: {message}")]
    InvalidForm { message: String },

    #[error("Missing form field: {field}")]
    MissingFormField { field: String },

    #[error("Malformed event envelope: {reason}")]
    MalformedEnvelope { reason: String },
}

impl NormalizeError {
    pub(crate) fn malformed(reason: &str) -> Self {
        Self::MalformedEnvelope {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_json(error: serde_json::Error) -> Self {
        Self::InvalidJson {
            message: error.to_string(),
        }
    }

    /// Collapse into the coarse error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyBody => ErrorKind::EmptyBody,
            Self::UnsupportedContentType { .. } => ErrorKind::UnsupportedContentType,
            Self::MissingBoundary
            | Self::NoJsonInMultipart
            | Self::InvalidJson { .. }
            | Self::InvalidForm { .. }
            | Self::MissingFormField { .. }
            | Self::MalformedEnvelope { .. } => ErrorKind::MalformedPayload,
        }
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Content-type dispatch and body normalization
///
/// Holds the multipart extraction strategy; everything else is stateless, so
/// normalizing the same input twice always yields the same outcome.
#[derive(Clone)]
pub struct BodyNormalizer {
    multipart: Arc<dyn MultipartExtractor>,
}

impl Default for BodyNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(BraceScanExtractor))
    }
}

impl std::fmt::Debug for BodyNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyNormalizer")
            .field("multipart", &self.multipart.name())
            .finish()
    }
}

impl BodyNormalizer {
    /// Create a normalizer with a specific multipart strategy
    pub fn new(multipart: Arc<dyn MultipartExtractor>) -> Self {
        Self { multipart }
    }

    /// Normalize a captured request
    pub fn normalize_request(&self, request: &RawRequest) -> ParseOutcome {
        self.normalize(request.content_type.as_deref(), &request.body)
    }

    /// Normalize a body according to its declared content type
    ///
    /// # Errors
    ///
    /// - [`NormalizeError::EmptyBody`] when `body` is empty, whatever the content type
    /// - [`NormalizeError::UnsupportedContentType`] for an absent or unknown type
    /// - any other variant when the body is in a known encoding but does not
    ///   contain a valid event envelope
    pub fn normalize(&self, content_type: Option<&str>, body: &[u8]) -> ParseOutcome {
        let event = self.dispatch(content_type, body)?;
        info!(event_type = %event.event_type(), "Webhook body normalized");
        Ok(event)
    }

    fn dispatch(&self, content_type: Option<&str>, body: &[u8]) -> ParseOutcome {
        if body.is_empty() {
            return Err(NormalizeError::EmptyBody);
        }

        let kind = ContentKind::from_header(content_type);
        debug!(content_kind = kind.label(), size = body.len(), "Normalizing webhook body");

        let document = match kind {
            ContentKind::Multipart { boundary } => {
                let boundary = boundary.ok_or(NormalizeError::MissingBoundary)?;
                return self.normalize_multipart(body, &boundary);
            }
            ContentKind::Json => serde_json::from_slice::<Value>(body)
                .map_err(NormalizeError::invalid_json)?,
            ContentKind::FormUrlEncoded => form::parse_json_field(body)?,
            ContentKind::Unsupported(content_type) => {
                return Err(NormalizeError::UnsupportedContentType { content_type });
            }
        };

        Event::from_document(document)
    }

    fn normalize_multipart(&self, body: &[u8], boundary: &str) -> ParseOutcome {
        let text = String::from_utf8_lossy(body);

        if let Some(document) = self.multipart.extract(&text, boundary) {
            return Event::from_document(document);
        }

        // The probe is sometimes sent with its payload stripped; recognise it
        // by name so verification still succeeds.
        if text.contains(CALLBACK_TEST_EVENT) {
            warn!(
                strategy = self.multipart.name(),
                "No JSON part in multipart body; synthesizing callback_test event"
            );
            return Ok(Event::callback_test());
        }

        Err(NormalizeError::NoJsonInMultipart)
    }
}

/// Normalize with the default strategies
///
/// Shorthand for `BodyNormalizer::default().normalize(content_type, body)`.
pub fn normalize(content_type: Option<&str>, body: &[u8]) -> ParseOutcome {
    BodyNormalizer::default().normalize(content_type, body)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
