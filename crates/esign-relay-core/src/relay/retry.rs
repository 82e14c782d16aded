//! # Retry Policy Module
//!
//! Attempt budget and delays for the downstream relay.
//!
//! Every attempt is preceded by a random delay drawn from a jitter window so
//! near-simultaneous forwards do not land on the downstream endpoint at the
//! same instant. Failed attempts are followed by a fixed pause before the
//! next one.

use rand::Rng;
use std::time::Duration;

/// Retry policy for relay attempts
///
/// # Examples
///
/// ```rust
/// use esign_relay_core::relay::RetryPolicy;
/// use std::time::Duration;
///
/// // Default policy: 3 attempts, 80-330ms jitter, 500ms between retries
/// let policy = RetryPolicy::default();
///
/// // Custom policy
/// let policy = RetryPolicy::new(
///     5,
///     Duration::from_millis(10),
///     Duration::from_millis(50),
///     Duration::from_secs(1),
/// );
/// assert_eq!(policy.max_attempts, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Lower bound of the pre-attempt jitter window
    pub jitter_min: Duration,

    /// Upper bound of the pre-attempt jitter window (inclusive)
    pub jitter_max: Duration,

    /// Fixed pause after a failed attempt when another one follows
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            jitter_min: Duration::from_millis(80),
            jitter_max: Duration::from_millis(330),
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// An inverted jitter window is normalized by swapping its bounds.
    pub fn new(
        max_attempts: u32,
        jitter_min: Duration,
        jitter_max: Duration,
        retry_delay: Duration,
    ) -> Self {
        let (jitter_min, jitter_max) = if jitter_min <= jitter_max {
            (jitter_min, jitter_max)
        } else {
            (jitter_max, jitter_min)
        };

        Self {
            max_attempts,
            jitter_min,
            jitter_max,
            retry_delay,
        }
    }

    /// Policy with no delays at all (tests and local tooling)
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    /// Draw the delay to wait before an attempt
    ///
    /// Uniform over `[jitter_min, jitter_max]` at millisecond resolution.
    pub fn jitter_delay(&self) -> Duration {
        let min = self.jitter_min.as_millis() as u64;
        let max = self.jitter_max.as_millis() as u64;

        if max <= min {
            return self.jitter_min;
        }

        let millis = rand::thread_rng().gen_range(min..=max);
        Duration::from_millis(millis)
    }

    /// Whether another attempt follows attempt number `attempt` (1-based)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use esign_relay_core::relay::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default(); // max_attempts = 3
    ///
    /// assert!(policy.should_retry(1));
    /// assert!(policy.should_retry(2));
    /// assert!(!policy.should_retry(3)); // no fourth attempt
    /// ```
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
