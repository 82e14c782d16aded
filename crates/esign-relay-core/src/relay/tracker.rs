//! Ownership of in-flight forwards.
//!
//! Forwards run detached from the request that produced them. The tracker
//! keeps them in a [`JoinSet`] so the process can report on them and give
//! them a bounded grace period at shutdown.

use super::ForwardReport;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

/// Counts collected while draining
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub delivered: usize,
    pub exhausted: usize,

    /// Tasks that panicked or were cancelled
    pub crashed: usize,

    /// Tasks still running when the grace period ran out
    pub abandoned: usize,
}

impl DrainSummary {
    pub fn total(&self) -> usize {
        self.delivered + self.exhausted + self.crashed + self.abandoned
    }

    fn record(&mut self, joined: Result<ForwardReport, JoinError>) {
        match joined {
            Ok(report) if report.is_success() => self.delivered += 1,
            Ok(_) => self.exhausted += 1,
            Err(e) => {
                error!(error = %e, "Forward task did not complete");
                self.crashed += 1;
            }
        }
    }
}

/// Shared handle to the set of background forwards
#[derive(Debug, Clone, Default)]
pub struct ForwardTracker {
    tasks: Arc<Mutex<JoinSet<ForwardReport>>>,
}

impl ForwardTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `forward` in the background
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, forward: F)
    where
        F: Future<Output = ForwardReport> + Send + 'static,
    {
        let mut tasks = self.lock();
        reap(&mut tasks);
        tasks.spawn(forward);
    }

    /// Forwards not yet finished
    pub fn in_flight(&self) -> usize {
        let mut tasks = self.lock();
        reap(&mut tasks);
        tasks.len()
    }

    /// Wait up to `grace` for every tracked forward, then abort the rest
    ///
    /// Forwards spawned after the drain starts are not covered.
    pub async fn drain(&self, grace: Duration) -> DrainSummary {
        let mut tasks = std::mem::take(&mut *self.lock());
        let mut summary = DrainSummary::default();

        if tasks.is_empty() {
            return summary;
        }

        info!(
            in_flight = tasks.len(),
            grace_ms = grace.as_millis() as u64,
            "Draining in-flight forwards"
        );

        let deadline = tokio::time::Instant::now() + grace;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(joined)) => summary.record(joined),
                Ok(None) => break,
                Err(_) => {
                    summary.abandoned = tasks.len();
                    warn!(
                        abandoned = summary.abandoned,
                        "Grace period elapsed, abandoning forwards"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        info!(
            delivered = summary.delivered,
            exhausted = summary.exhausted,
            crashed = summary.crashed,
            abandoned = summary.abandoned,
            "Forward drain complete"
        );
        summary
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<ForwardReport>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn reap(tasks: &mut JoinSet<ForwardReport>) {
    while let Some(joined) = tasks.try_join_next() {
        if let Err(e) = joined {
            error!(error = %e, "Forward task did not complete");
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
