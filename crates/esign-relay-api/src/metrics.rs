//! Metrics collection for the API service.
//!
//! Each [`ServiceMetrics`] owns its own [`Registry`], so several instances
//! can coexist in one process (tests build one per router).

use esign_relay_core::relay::{ForwardAttempt, ForwardObserver, ForwardReport};
use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Service metrics for observability
pub struct ServiceMetrics {
    registry: Registry,

    /// Inbound webhooks by outcome (challenge, forwarded, acknowledged, or an
    /// error kind)
    pub webhook_requests_total: IntCounterVec,

    /// Individual relay attempts by outcome
    pub forward_attempts_total: IntCounterVec,

    /// Completed forwards by terminal result
    pub forwards_total: IntCounterVec,

    /// Forwards currently running, refreshed on scrape
    pub forwards_in_flight: IntGauge,
}

impl std::fmt::Debug for ServiceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMetrics")
            .field("forwards_in_flight", &self.forwards_in_flight.get())
            .finish_non_exhaustive()
    }
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhook_requests_total = IntCounterVec::new(
            Opts::new("webhook_requests_total", "Webhook requests received"),
            &["outcome"],
        )?;
        let forward_attempts_total = IntCounterVec::new(
            Opts::new("forward_attempts_total", "Downstream relay attempts"),
            &["outcome"],
        )?;
        let forwards_total = IntCounterVec::new(
            Opts::new("forwards_total", "Completed forwards"),
            &["result"],
        )?;
        let forwards_in_flight =
            IntGauge::new("forwards_in_flight", "Forwards not yet finished")?;

        registry.register(Box::new(webhook_requests_total.clone()))?;
        registry.register(Box::new(forward_attempts_total.clone()))?;
        registry.register(Box::new(forwards_total.clone()))?;
        registry.register(Box::new(forwards_in_flight.clone()))?;

        Ok(Arc::new(Self {
            registry,
            webhook_requests_total,
            forward_attempts_total,
            forwards_total,
            forwards_in_flight,
        }))
    }

    pub fn record_webhook(&self, outcome: &str) {
        self.webhook_requests_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn set_in_flight(&self, count: usize) {
        self.forwards_in_flight.set(count as i64);
    }

    /// Render the registry in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl ForwardObserver for ServiceMetrics {
    fn on_attempt(&self, _event_type: &str, attempt: &ForwardAttempt) {
        self.forward_attempts_total
            .with_label_values(&[attempt.outcome.label()])
            .inc();
    }

    fn on_complete(&self, report: &ForwardReport) {
        self.forwards_total
            .with_label_values(&[report.result_label()])
            .inc();
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
