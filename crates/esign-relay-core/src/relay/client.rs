//! HTTP client for the downstream relay endpoint.

use crate::Event;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for relay HTTP operations
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid downstream URL: {0}")]
    InvalidUrl(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl RelayError {
    /// Whether a later attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) | Self::RequestFailed(_) => true,
            Self::InvalidUrl(_) | Self::ClientBuild(_) => false,
        }
    }
}

/// Parse `url` as an absolute `http` or `https` URL with a host
///
/// # Errors
///
/// Returns [`RelayError::InvalidUrl`] for anything else.
pub fn parse_downstream_url(url: &str) -> Result<url::Url, RelayError> {
    let parsed =
        url::Url::parse(url).map_err(|e| RelayError::InvalidUrl(format!("{url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RelayError::InvalidUrl(format!(
            "{url}: scheme must be http or https"
        )));
    }
    if parsed.host_str().unwrap_or_default().is_empty() {
        return Err(RelayError::InvalidUrl(format!("{url}: missing host")));
    }
    Ok(parsed)
}

/// Raw downstream reply: status and body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: String,
}

impl RelayResponse {
    /// Whether the HTTP status is 2xx
    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one event to the downstream endpoint
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// POST the event as JSON and return the reply
    async fn post_json(&self, url: &str, event: &Event) -> Result<RelayResponse, RelayError>;
}

/// `reqwest`-backed relay client
#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    client: Client,
    timeout: Duration,
}

impl HttpRelayClient {
    /// Create a client with the default timeout
    pub fn new() -> Result<Self, RelayError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom per-request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("esign-relay/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::ClientBuild(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> RelayError {
        if err.is_timeout() {
            RelayError::Timeout(self.timeout)
        } else if err.is_connect() {
            RelayError::Network(err.to_string())
        } else {
            RelayError::RequestFailed(err.to_string())
        }
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn post_json(&self, url: &str, event: &Event) -> Result<RelayResponse, RelayError> {
        debug!(url = %url, event_type = %event.event_type(), "Relaying event");
        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Relay request failed");
                self.classify(e)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        debug!(
            url = %url,
            status = status,
            response_time_ms = start.elapsed().as_millis() as u64,
            "Relay response received"
        );

        Ok(RelayResponse { status, body })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
