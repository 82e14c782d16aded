//! Common test utilities for esign-relay-api integration tests
//!
//! This module provides:
//! - App state builders with and without a downstream forwarder
//! - Request helpers for the three accepted body encodings
//! - Shared payload fixtures

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use esign_relay_api::{create_router, AppState, ServiceConfig, ServiceMetrics};
use esign_relay_core::relay::{HttpRelayClient, ReliableForwarder, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const WEBHOOK_PATH: &str = "/api/webhook";

pub const SIGNED_EVENT: &str = r#"{"event":{"event_type":"signature_request_signed","event_time":"1700000000","event_hash":"abc"},"signature_request":{"signature_request_id":"sr-1","title":"NDA"}}"#;

pub const CHALLENGE_EVENT: &str =
    r#"{"event":{"event_type":"callback_test","event_data":{"challenge":"abc123"}}}"#;

pub const PROBE_WITHOUT_CHALLENGE: &str = r#"{"event":{"event_type":"callback_test"}}"#;

// ============================================================================
// State builders
// ============================================================================

/// Retry policy with millisecond delays so tests stay fast
#[allow(dead_code)]
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(
        3,
        Duration::from_millis(1),
        Duration::from_millis(5),
        Duration::from_millis(10),
    )
}

/// App state with forwarding disabled
#[allow(dead_code)]
pub fn create_test_app_state() -> AppState {
    AppState::from_config(ServiceConfig::default()).expect("default config builds")
}

/// App state forwarding to `url` with [`fast_policy`]
#[allow(dead_code)]
pub fn create_forwarding_app_state(url: &str) -> AppState {
    let metrics = ServiceMetrics::new().expect("metrics");
    let client = HttpRelayClient::with_timeout(Duration::from_secs(2)).expect("client");
    let forwarder = ReliableForwarder::new(url, Arc::new(client), fast_policy())
        .expect("valid url")
        .with_observer(metrics.clone());

    AppState::new(ServiceConfig::default(), Some(Arc::new(forwarder)), metrics)
}

// ============================================================================
// Request helpers
// ============================================================================

/// Reply captured from the router
#[derive(Debug)]
#[allow(dead_code)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
}

/// POST `body` to the webhook path with the given content type
#[allow(dead_code)]
pub async fn post_webhook(app: Router, content_type: Option<&str>, body: impl Into<Body>) -> Reply {
    let mut builder = Request::builder().method(Method::POST).uri(WEBHOOK_PATH);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }

    send(app, builder.body(body.into()).unwrap()).await
}

#[allow(dead_code)]
pub async fn send(app: Router, request: Request<Body>) -> Reply {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    Reply {
        status,
        content_type,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

/// Router for [`create_test_app_state`]
#[allow(dead_code)]
pub fn test_router() -> Router {
    create_router(create_test_app_state())
}

// ============================================================================
// Body fixtures
// ============================================================================

/// URL-encoded body with the JSON in the `json` field
#[allow(dead_code)]
pub fn form_body(json: &str) -> String {
    serde_urlencoded::to_string([("json", json)]).unwrap()
}

/// Multipart body with a single `json` part
#[allow(dead_code)]
pub fn multipart_body(boundary: &str, json: &str) -> String {
    format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"json\"\r\n\
         \r\n\
         {json}\r\n\
         --{boundary}--\r\n"
    )
}
