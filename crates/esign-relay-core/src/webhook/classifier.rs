//! Reply selection for normalized events.

use crate::Event;
use tracing::info;

/// Acknowledgement body the provider's dashboard expects before it marks the
/// endpoint as verified. Protocol constant; do not reword.
pub const ACKNOWLEDGEMENT: &str = "Hello API Event Received";

/// What the endpoint owes the provider for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyDecision {
    /// Echo the challenge token verbatim
    Challenge(String),
    /// Reply with [`ACKNOWLEDGEMENT`]; `forward` tells whether the event must
    /// also be relayed downstream once the reply has been sent
    Acknowledge { forward: bool },
}

impl ReplyDecision {
    /// Reply body, always sent as `text/plain` with status 200
    pub fn body(&self) -> &str {
        match self {
            Self::Challenge(token) => token,
            Self::Acknowledge { .. } => ACKNOWLEDGEMENT,
        }
    }

    /// Whether the event must be relayed after replying
    pub fn should_forward(&self) -> bool {
        matches!(self, Self::Acknowledge { forward: true })
    }
}

/// Routes events to the challenge-response or acknowledgement path
#[derive(Debug, Clone, Copy, Default)]
pub struct EventClassifier;

impl EventClassifier {
    /// Decide the synchronous reply for an event
    ///
    /// Verification probes are never forwarded. A probe without a challenge
    /// token is acknowledged rather than rejected.
    pub fn classify(event: &Event) -> ReplyDecision {
        if !event.is_callback_test() {
            return ReplyDecision::Acknowledge { forward: true };
        }

        match event.challenge() {
            Some(token) => {
                info!("Verification probe with challenge; echoing token");
                ReplyDecision::Challenge(token)
            }
            None => {
                info!("Verification probe without challenge; acknowledging");
                ReplyDecision::Acknowledge { forward: false }
            }
        }
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
