//! Integration tests for the attendance SSE stream

use std::sync::Arc;
use std::time::Duration;

use acs_common::db::init_memory_database;
use acs_common::events::EventBus;
use acs_common::time::ManualClock;
use acs_server::{build_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::util::ServiceExt;

async fn setup_app(keepalive: Duration) -> (Router, EventBus) {
    let db = init_memory_database().await.unwrap();
    let events = EventBus::new(64);
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let state = AppState::new(db, events.clone(), clock, keepalive);
    (build_router(state), events)
}

/// Read body frames until one contains `needle`
async fn read_until(body: &mut Body, needle: &str) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
            .await
            .expect("timed out waiting for SSE frame")
            .expect("stream ended")
            .expect("frame error");
        if let Ok(data) = frame.into_data() {
            let text = String::from_utf8_lossy(&data).to_string();
            if text.contains(needle) {
                return text;
            }
        }
    }
}

#[tokio::test]
async fn test_stream_starts_with_connected() {
    let (app, _events) = setup_app(Duration::from_secs(60)).await;

    let response = app
        .oneshot(Request::builder().uri("/api/attendance/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let mut body = response.into_body();
    let first = read_until(&mut body, "event").await;
    assert!(first.contains("connected"), "first frame was {:?}", first);
}

#[tokio::test]
async fn test_stream_delivers_attendance_update() {
    let (app, events) = setup_app(Duration::from_secs(60)).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/attendance/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let mut body = response.into_body();
    read_until(&mut body, "connected").await;
    assert_eq!(events.subscriber_count(), 1);

    let clock = Request::builder()
        .method("POST")
        .uri("/api/attendance/clock")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "identity": "E001", "action": "IN" }).to_string()))
        .unwrap();
    let clocked = app.oneshot(clock).await.unwrap();
    assert_eq!(clocked.status(), StatusCode::OK);

    let update = read_until(&mut body, "attendance_update").await;
    assert!(update.contains("\"identity\":\"E001\""));
    assert!(update.contains("\"action\":\"IN\""));
    assert!(update.contains("\"status\":\"ACTIVE\""));

    drop(body);
    // Dropped stream deregisters its receiver
    assert_eq!(events.subscriber_count(), 0);
}

#[tokio::test]
async fn test_stream_keepalive() {
    let (app, _events) = setup_app(Duration::from_millis(20)).await;

    let response = app
        .oneshot(Request::builder().uri("/api/attendance/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let mut body = response.into_body();

    read_until(&mut body, "connected").await;
    let keepalive = read_until(&mut body, "keepalive").await;
    assert!(keepalive.contains("\"type\":\"keepalive\""));
}
