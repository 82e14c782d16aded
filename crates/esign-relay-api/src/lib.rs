//! # eSign Relay HTTP Service
//!
//! HTTP server for receiving e-signature provider webhooks and relaying them
//! downstream.
//!
//! This service provides:
//! - The webhook endpoint (POST only), answering the provider synchronously
//! - Background forwarding of standard events with bounded retries
//! - Health and Prometheus metrics endpoints
//! - Graceful shutdown that drains in-flight forwards

pub mod config;
pub mod errors;
pub mod metrics;

pub use config::{LoggingConfig, RelayConfig, ServerConfig, ServiceConfig, WebhookConfig};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use esign_relay_core::{
    relay::{DrainSummary, ForwardTracker, HttpRelayClient, ReliableForwarder},
    webhook::{BodyNormalizer, EventClassifier, RawRequest, ReplyDecision},
};
use serde::{Deserialize, Serialize};
use std::{
    future::{Future, IntoFuture},
    sync::Arc,
};
use tokio::sync::oneshot;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, instrument, warn};

/// Bytes of a rejected body included in debug logs
const BODY_PREVIEW_LIMIT: usize = 500;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Turns raw bodies into events
    pub normalizer: Arc<BodyNormalizer>,

    /// Downstream relay; `None` when no downstream URL is configured
    pub forwarder: Option<Arc<ReliableForwarder>>,

    /// Owner of background forwards
    pub tracker: ForwardTracker,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        forwarder: Option<Arc<ReliableForwarder>>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            normalizer: Arc::new(BodyNormalizer::default()),
            forwarder,
            tracker: ForwardTracker::new(),
            metrics,
        }
    }

    /// Build state from configuration alone, wiring the HTTP relay client
    ///
    /// # Errors
    ///
    /// Fails if metrics cannot be registered or the configured downstream
    /// URL is unusable.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        let metrics = ServiceMetrics::new()?;
        let forwarder = build_forwarder(&config.relay, metrics.clone())?;
        Ok(Self::new(config, forwarder, metrics))
    }

    /// Replace the body normalizer (custom multipart strategy)
    pub fn with_normalizer(mut self, normalizer: BodyNormalizer) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }
}

/// Construct the forwarder described by `relay`, if any
///
/// Returns `Ok(None)` when no downstream URL is configured.
pub fn build_forwarder(
    relay: &RelayConfig,
    metrics: Arc<ServiceMetrics>,
) -> Result<Option<Arc<ReliableForwarder>>, ServiceError> {
    let Some(url) = relay
        .downstream_url
        .as_deref()
        .filter(|_| relay.forwarding_enabled())
    else {
        return Ok(None);
    };

    let client = HttpRelayClient::with_timeout(relay.request_timeout())?;
    let forwarder = ReliableForwarder::new(url, Arc::new(client), relay.retry_policy())?
        .with_observer(metrics);

    Ok(Some(Arc::new(forwarder)))
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let endpoint_path = state.config.webhook.endpoint_path.clone();
    let max_body_size = state.config.server.max_body_size;
    let enable_cors = state.config.server.enable_cors;

    let router = Router::new()
        .route(
            &endpoint_path,
            post(handle_webhook).fallback(method_not_allowed),
        )
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}

/// Start HTTP server
///
/// Binds the configured address and serves until SIGINT or SIGTERM, then
/// drains in-flight forwards.
pub async fn start_server(state: AppState) -> Result<DrainSummary, ServiceError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.clone(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", addr);

    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
///
/// After `shutdown` resolves, open connections get
/// `server.shutdown_timeout_seconds` to finish. Outstanding forwards then
/// get the configured drain grace period before they are abandoned.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<DrainSummary, ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let tracker = state.tracker.clone();
    let grace = state.config.relay.drain_grace();
    let shutdown_timeout = state.config.server.shutdown_timeout();
    let app = create_router(state);

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let shutdown = async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    };

    // The deadline only starts once the shutdown signal has fired
    let deadline = async move {
        if signalled_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
        info!(
            timeout_seconds = shutdown_timeout.as_secs(),
            "Initiating graceful shutdown"
        );
        tokio::time::sleep(shutdown_timeout).await;
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
            info!("HTTP server stopped accepting requests");
        }
        _ = deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Open connections did not finish before the shutdown timeout; closing them"
            );
        }
    }

    let summary = tracker.drain(grace).await;
    info!("HTTP server shutdown complete");

    Ok(summary)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Handle e-signature provider webhooks
///
/// Normalizes the body, classifies the event and replies immediately.
/// Standard events are handed to the forwarder as a background task; the
/// reply never waits on, or reflects, the downstream outcome.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookHandlerError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let request = RawRequest::new(content_type, body);

    let event = match state.normalizer.normalize_request(&request) {
        Ok(event) => event,
        Err(e) => {
            state.metrics.record_webhook(e.kind().label());
            debug!(
                content_type = request.content_type.as_deref().unwrap_or(""),
                body_preview = %body_preview(&request.body),
                "Rejected webhook body"
            );
            return Err(e.into());
        }
    };

    let decision = EventClassifier::classify(&event);
    let outcome = match &decision {
        ReplyDecision::Challenge(_) => "challenge",
        ReplyDecision::Acknowledge { forward: false } => "acknowledged",
        ReplyDecision::Acknowledge { forward: true } => match &state.forwarder {
            Some(forwarder) => {
                forwarder.spawn(event, &state.tracker);
                "forwarded"
            }
            None => {
                info!(
                    event_type = %event.event_type(),
                    "No downstream URL configured; event acknowledged without forwarding"
                );
                "acknowledged"
            }
        },
    };

    state.metrics.record_webhook(outcome);
    debug!(
        outcome,
        elapsed_us = request.elapsed().as_micros() as u64,
        "Webhook answered"
    );
    Ok((StatusCode::OK, decision.body().to_string()).into_response())
}

/// Reply for any method other than POST on the webhook path
async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

fn body_preview(body: &[u8]) -> String {
    let end = body.len().min(BODY_PREVIEW_LIMIT);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

// ============================================================================
// Health and Metrics Handlers
// ============================================================================

/// Basic health check endpoint
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        forwarding_enabled: state.forwarder.is_some(),
        forwards_in_flight: state.tracker.in_flight(),
    })
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.set_in_flight(state.tracker.in_flight());

    state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses an inbound `x-correlation-id` or generates one, records it on the
/// span and echoes it on the response.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub forwarding_enabled: bool,
    pub forwards_in_flight: usize,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
