//! # eSign Relay Core
//!
//! Core logic for the e-signature webhook relay.
//!
//! This crate turns an inbound webhook body into a canonical [`Event`],
//! decides the synchronous reply owed to the provider, and relays the event
//! to a downstream automation endpoint out of band.
//!
//! ## Architecture
//!
//! - [`webhook`] reads the declared content type, normalizes the body in one
//!   of three wire encodings and classifies the resulting event
//! - [`relay`] forwards events with bounded retries and jitter, and tracks the
//!   detached forward tasks so the owning process can drain them on shutdown
//!
//! Nothing here depends on an HTTP server; the API crate adapts these
//! operations to axum.
//!
//! ## Usage
//!
//! ```rust
//! use esign_relay_core::webhook::{normalize, EventClassifier, ReplyDecision};
//!
//! let body = br#"{"event":{"event_type":"signature_request_signed"}}"#;
//! let event = normalize(Some("application/json"), body).unwrap();
//!
//! assert_eq!(event.event_type(), "signature_request_signed");
//! assert_eq!(
//!     EventClassifier::classify(&event),
//!     ReplyDecision::Acknowledge { forward: true }
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use ulid::Ulid;

pub mod event;
pub mod relay;
pub mod webhook;

pub use event::Event;

// ============================================================================
// Identifier Types
// ============================================================================

/// Identifier for one forward sequence (all attempts for a single event)
///
/// Uses ULID so identifiers sort by creation time in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForwardId(Ulid);

impl ForwardId {
    /// Generate a new unique forward ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ForwardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ForwardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get duration since another timestamp
    ///
    /// Returns zero when `other` is later than `self`.
    pub fn duration_since(&self, other: Self) -> Duration {
        self.0
            .signed_duration_since(other.0)
            .to_std()
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
