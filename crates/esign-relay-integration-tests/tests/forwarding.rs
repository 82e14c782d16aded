//! Integration tests for background forwarding
//!
//! A `wiremock` server stands in for the downstream automation endpoint.
//! Each test posts through the router, then drains the tracker so the
//! background forward has finished before the mock's expectations are
//! verified.

mod common;

use axum::http::StatusCode;
use common::{
    create_forwarding_app_state, post_webhook, CHALLENGE_EVENT, SIGNED_EVENT,
};
use esign_relay_api::{create_router, serve, AppState, ServiceConfig};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DRAIN: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_forwarded_body_matches_received_document() {
    let downstream = MockServer::start().await;
    let expected: serde_json::Value = serde_json::from_str(SIGNED_EVENT).unwrap();
    Mock::given(method("POST"))
        .and(path("/exec"))
        .and(header("content-type", "application/json"))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success":true}"#))
        .expect(1)
        .mount(&downstream)
        .await;

    let state = create_forwarding_app_state(&format!("{}/exec", downstream.uri()));
    let tracker = state.tracker.clone();

    let reply = post_webhook(create_router(state), Some("application/json"), SIGNED_EVENT).await;
    assert_eq!(reply.status, StatusCode::OK);

    let summary = tracker.drain(DRAIN).await;
    assert_eq!(summary.delivered, 1);
}

#[tokio::test]
async fn test_form_and_multipart_events_are_forwarded_as_json() {
    let downstream = MockServer::start().await;
    let expected: serde_json::Value = serde_json::from_str(SIGNED_EVENT).unwrap();
    Mock::given(method("POST"))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(2)
        .mount(&downstream)
        .await;

    let state = create_forwarding_app_state(&downstream.uri());
    let tracker = state.tracker.clone();
    let app = create_router(state);

    post_webhook(
        app.clone(),
        Some("application/x-www-form-urlencoded"),
        common::form_body(SIGNED_EVENT),
    )
    .await;
    post_webhook(
        app,
        Some("multipart/form-data; boundary=zz"),
        common::multipart_body("zz", SIGNED_EVENT),
    )
    .await;

    let summary = tracker.drain(DRAIN).await;
    assert_eq!(summary.delivered, 2);
}

#[tokio::test]
async fn test_forward_stops_after_three_rejections() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"success":false,"error":"x"}"#),
        )
        .expect(3)
        .mount(&downstream)
        .await;

    let state = create_forwarding_app_state(&downstream.uri());
    let tracker = state.tracker.clone();
    let metrics = state.metrics.clone();

    let reply = post_webhook(create_router(state), Some("application/json"), SIGNED_EVENT).await;
    assert_eq!(reply.status, StatusCode::OK, "downstream failure never reaches the caller");

    let summary = tracker.drain(DRAIN).await;
    assert_eq!(summary.exhausted, 1);
    assert_eq!(
        metrics
            .forward_attempts_total
            .with_label_values(&["failure"])
            .get(),
        3
    );
    assert_eq!(
        metrics.forwards_total.with_label_values(&["exhausted"]).get(),
        1
    );
}

#[tokio::test]
async fn test_non_json_reply_is_single_attempt_success() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&downstream)
        .await;

    let state = create_forwarding_app_state(&downstream.uri());
    let tracker = state.tracker.clone();

    post_webhook(create_router(state), Some("application/json"), SIGNED_EVENT).await;

    assert_eq!(tracker.drain(DRAIN).await.delivered, 1);
}

#[tokio::test]
async fn test_probes_and_rejections_are_never_forwarded() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&downstream)
        .await;

    let state = create_forwarding_app_state(&downstream.uri());
    let tracker = state.tracker.clone();
    let app = create_router(state);

    post_webhook(app.clone(), Some("application/json"), CHALLENGE_EVENT).await;
    post_webhook(app.clone(), Some("application/json"), "").await;
    post_webhook(app, Some("text/plain"), SIGNED_EVENT).await;

    assert_eq!(tracker.drain(DRAIN).await.total(), 0);
}

#[tokio::test]
async fn test_reply_does_not_wait_for_slow_downstream() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
        .mount(&downstream)
        .await;

    let state = create_forwarding_app_state(&downstream.uri());
    let tracker = state.tracker.clone();

    let start = std::time::Instant::now();
    let reply = post_webhook(create_router(state), Some("application/json"), SIGNED_EVENT).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(start.elapsed() < Duration::from_millis(1000));
    assert_eq!(tracker.in_flight(), 1);

    tracker.drain(DRAIN).await;
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_forwards() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"success":true}"#)
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&downstream)
        .await;

    let state = create_forwarding_app_state(&downstream.uri());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(serve(listener, state, async {
        let _ = stopped.await;
    }));

    let client = reqwest::Client::new();
    let body = client
        .post(format!("http://{addr}/api/webhook"))
        .header("content-type", "application/json")
        .body(SIGNED_EVENT)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "Hello API Event Received");
    drop(client);

    stop.send(()).unwrap();
    let summary = server.await.unwrap().expect("server ran");

    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.abandoned, 0);
}

#[tokio::test]
async fn test_stalled_upload_does_not_block_shutdown() {
    let mut config = ServiceConfig::default();
    config.server.shutdown_timeout_seconds = 1;
    let state = AppState::from_config(config).expect("valid config");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(serve(listener, state, async {
        let _ = stopped.await;
    }));

    // Announce a body that never fully arrives
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"POST /api/webhook HTTP/1.1\r\n\
              Host: localhost\r\n\
              Content-Type: application/json\r\n\
              Content-Length: 1000\r\n\
              \r\n\
              {\"event\":",
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    stop.send(()).unwrap();
    let summary = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("serve returns once the shutdown timeout passes")
        .unwrap()
        .expect("server ran");

    assert_eq!(summary.total(), 0);
    drop(stream);
}
