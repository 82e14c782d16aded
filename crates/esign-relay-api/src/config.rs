//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use esign_relay_core::relay::{parse_downstream_url, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Paths served by the router itself; the webhook endpoint may not shadow them
const RESERVED_PATHS: [&str; 2] = ["/health", "/metrics"];

/// Service configuration
///
/// Every field carries a serde default, so an empty source yields a
/// runnable configuration with forwarding disabled.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Inbound webhook settings
    pub webhook: WebhookConfig,

    /// Downstream relay settings
    pub relay: RelayConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check cross-field constraints that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_body_size == 0 {
            return Err(ConfigError::invalid("server.max_body_size must be greater than 0"));
        }

        let path = &self.webhook.endpoint_path;
        if !path.starts_with('/') {
            return Err(ConfigError::invalid(format!(
                "webhook.endpoint_path must start with '/': {path}"
            )));
        }
        if RESERVED_PATHS.contains(&path.as_str()) {
            return Err(ConfigError::invalid(format!(
                "webhook.endpoint_path conflicts with a built-in route: {path}"
            )));
        }

        self.relay.validate()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// How long open connections may run after a shutdown signal, in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 10 * 1024 * 1024, // 10MB
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

/// Webhook endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/api/webhook".to_string(),
        }
    }
}

/// Downstream relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Downstream automation endpoint; forwarding is disabled when absent
    pub downstream_url: Option<String>,

    /// Attempts per event, including the first
    pub max_attempts: u32,

    /// Lower bound of the pre-attempt jitter, in milliseconds
    ///
    /// Must be non-zero. The forward task starts while the handler is still
    /// replying, so this delay is what lets the reply go out before the
    /// first downstream POST.
    pub jitter_min_ms: u64,

    /// Upper bound of the pre-attempt jitter, in milliseconds
    pub jitter_max_ms: u64,

    /// Pause after a failed attempt, in milliseconds
    pub retry_delay_ms: u64,

    /// Per-request timeout for downstream calls
    pub request_timeout_seconds: u64,

    /// How long shutdown waits for in-flight forwards
    pub drain_grace_seconds: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            downstream_url: None,
            max_attempts: 3,
            jitter_min_ms: 80,
            jitter_max_ms: 330,
            retry_delay_ms: 500,
            request_timeout_seconds: 10,
            drain_grace_seconds: 10,
        }
    }
}

impl RelayConfig {
    /// Whether a downstream URL is configured
    pub fn forwarding_enabled(&self) -> bool {
        self.downstream_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// Use `legacy` as the downstream URL when none is configured
    ///
    /// Returns `true` if the fallback was applied.
    pub fn apply_legacy_url(&mut self, legacy: Option<String>) -> bool {
        if self.forwarding_enabled() {
            return false;
        }
        match legacy.filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                self.downstream_url = Some(url);
                true
            }
            None => false,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.jitter_min_ms),
            Duration::from_millis(self.jitter_max_ms),
            Duration::from_millis(self.retry_delay_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("relay.max_attempts must be at least 1"));
        }
        if self.jitter_min_ms == 0 {
            return Err(ConfigError::invalid(
                "relay.jitter_min_ms must be greater than 0",
            ));
        }
        if self.jitter_min_ms > self.jitter_max_ms {
            return Err(ConfigError::invalid(format!(
                "relay.jitter_min_ms ({}) exceeds relay.jitter_max_ms ({})",
                self.jitter_min_ms, self.jitter_max_ms
            )));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "relay.request_timeout_seconds must be greater than 0",
            ));
        }

        if let Some(url) = self.downstream_url.as_deref().filter(|u| !u.trim().is_empty()) {
            parse_downstream_url(url).map_err(|e| {
                ConfigError::invalid(format!("relay.downstream_url must be an http(s) URL: {e}"))
            })?;
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
