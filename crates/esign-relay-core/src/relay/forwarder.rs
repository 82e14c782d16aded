//! Attempt loop for relaying events downstream.

use super::{
    classify_response, parse_downstream_url, AttemptOutcome, ForwardTracker, RelayClient,
    RelayError, RetryPolicy,
};
use crate::{Event, ForwardId, Timestamp};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// ============================================================================
// Forward Result Types
// ============================================================================

/// Record of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardAttempt {
    /// 1-based attempt number
    pub attempt_number: u32,

    /// Jitter waited before this attempt
    pub delay_before: Duration,

    pub outcome: AttemptOutcome,
}

/// Terminal state of a forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardResult {
    /// Downstream accepted the event
    Delivered,

    /// Every attempt failed
    Exhausted { last_error: String },
}

/// Full account of one forward, returned when its loop ends
#[derive(Debug, Clone)]
pub struct ForwardReport {
    pub forward_id: ForwardId,
    pub event_type: String,
    pub started_at: Timestamp,
    pub attempts: Vec<ForwardAttempt>,

    /// Number of fixed retry pauses taken between attempts
    pub retry_waits: u32,

    pub result: ForwardResult,
}

impl ForwardReport {
    pub fn is_success(&self) -> bool {
        matches!(self.result, ForwardResult::Delivered)
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Label used for metrics and logs
    pub fn result_label(&self) -> &'static str {
        match self.result {
            ForwardResult::Delivered => "delivered",
            ForwardResult::Exhausted { .. } => "exhausted",
        }
    }
}

/// Hook for watching forwards as they progress
///
/// Both methods default to no-ops.
pub trait ForwardObserver: Send + Sync {
    fn on_attempt(&self, _event_type: &str, _attempt: &ForwardAttempt) {}

    fn on_complete(&self, _report: &ForwardReport) {}
}

// ============================================================================
// Reliable Forwarder
// ============================================================================

/// Sends events to a fixed downstream URL under a [`RetryPolicy`]
pub struct ReliableForwarder {
    url: String,
    client: Arc<dyn RelayClient>,
    policy: RetryPolicy,
    observer: Option<Arc<dyn ForwardObserver>>,
}

impl fmt::Debug for ReliableForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReliableForwarder")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl ReliableForwarder {
    /// Create a forwarder for `url`
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidUrl`] unless `url` is an absolute
    /// `http` or `https` URL with a host.
    pub fn new(
        url: &str,
        client: Arc<dyn RelayClient>,
        policy: RetryPolicy,
    ) -> Result<Self, RelayError> {
        parse_downstream_url(url)?;

        Ok(Self {
            url: url.to_string(),
            client,
            policy,
            observer: None,
        })
    }

    /// Attach an observer notified of every attempt and completion
    pub fn with_observer(mut self, observer: Arc<dyn ForwardObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the attempt loop to completion
    ///
    /// Attempts stop at the first success, at a client error that no retry
    /// can fix, or once the policy's budget is spent. Nothing here is
    /// surfaced to the webhook caller.
    pub async fn forward(&self, event: &Event) -> ForwardReport {
        let forward_id = ForwardId::new();
        let started_at = Timestamp::now();
        let event_type = event.event_type().to_string();
        let mut attempts = Vec::new();
        let mut retry_waits = 0;

        debug!(
            forward_id = %forward_id,
            event_type = %event_type,
            max_attempts = self.policy.max_attempts,
            "Starting forward"
        );

        for attempt_number in 1..=self.policy.max_attempts {
            let delay_before = self.policy.jitter_delay();
            tokio::time::sleep(delay_before).await;

            let mut permanent = false;
            let outcome = match self.client.post_json(&self.url, event).await {
                Ok(response) => {
                    if !response.is_success_status() {
                        warn!(
                            forward_id = %forward_id,
                            status = response.status,
                            "Downstream replied with a non-2xx status"
                        );
                    }
                    classify_response(&response.body)
                }
                Err(e) => {
                    permanent = !e.is_transient();
                    AttemptOutcome::RecoverableFailure(e.to_string())
                }
            };

            let attempt = ForwardAttempt {
                attempt_number,
                delay_before,
                outcome,
            };
            if let Some(observer) = &self.observer {
                observer.on_attempt(&event_type, &attempt);
            }

            let delivered = attempt.outcome.is_success();
            if let AttemptOutcome::RecoverableFailure(reason) = &attempt.outcome {
                warn!(
                    forward_id = %forward_id,
                    event_type = %event_type,
                    attempt = attempt_number,
                    error = %reason,
                    "Forward attempt failed"
                );
            }
            attempts.push(attempt);

            if delivered {
                info!(
                    forward_id = %forward_id,
                    event_type = %event_type,
                    attempts = attempt_number,
                    elapsed_ms = Timestamp::now().duration_since(started_at).as_millis() as u64,
                    "Event forwarded"
                );
                return self.finish(ForwardReport {
                    forward_id,
                    event_type,
                    started_at,
                    attempts,
                    retry_waits,
                    result: ForwardResult::Delivered,
                });
            }

            if permanent {
                break;
            }

            if self.policy.should_retry(attempt_number) {
                retry_waits += 1;
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        let last_error = attempts
            .last()
            .and_then(|a| match &a.outcome {
                AttemptOutcome::RecoverableFailure(reason) => Some(reason.clone()),
                AttemptOutcome::Success => None,
            })
            .unwrap_or_else(|| "no attempts were made".to_string());

        error!(
            forward_id = %forward_id,
            event_type = %event_type,
            attempts = attempts.len(),
            elapsed_ms = Timestamp::now().duration_since(started_at).as_millis() as u64,
            error = %last_error,
            "Forward failed"
        );

        self.finish(ForwardReport {
            forward_id,
            event_type,
            started_at,
            attempts,
            retry_waits,
            result: ForwardResult::Exhausted { last_error },
        })
    }

    /// Forward in the background, owned by `tracker`
    pub fn spawn(self: &Arc<Self>, event: Event, tracker: &ForwardTracker) {
        let forwarder = Arc::clone(self);
        tracker.spawn(async move { forwarder.forward(&event).await });
    }

    fn finish(&self, report: ForwardReport) -> ForwardReport {
        if let Some(observer) = &self.observer {
            observer.on_complete(&report);
        }
        report
    }
}

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod tests;
