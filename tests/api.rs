//! HTTP surface tests: webhook ingestion and read-only endpoints.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Duration;
use outagewatch::api::{self, state::AppState};
use outagewatch::detect::engine::AnalysisEngine;
use outagewatch::detect::NotificationGate;
use outagewatch::notify::LogSink;
use outagewatch::probes::{PatternRoleClassifier, ProbeRegistry};
use outagewatch::storage::{self, EventStore, OutageLog};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(dir: &tempfile::TempDir) -> Router {
    let pool = storage::open_pool(dir.path().join("events.db").to_str().unwrap()).unwrap();
    let store = EventStore::new(pool.clone());
    let registry = ProbeRegistry::new(Arc::new(PatternRoleClassifier::default()));
    let engine = AnalysisEngine::new(
        store.clone(),
        registry.clone(),
        NotificationGate::new(Duration::minutes(5)),
        Arc::new(LogSink),
        Duration::minutes(5),
    );
    let (handle, _task) = engine.spawn();
    api::router(AppState {
        store,
        outages: OutageLog::new(pool),
        registry,
        engine: handle,
        window: Duration::minutes(5),
    })
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_webhook(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn heartbeat(name: &str, status: u8) -> String {
    let ping = if status == 1 { json!(12.5) } else { Value::Null };
    json!({
        "heartbeat": { "status": status, "ping": ping, "msg": "" },
        "monitor": { "name": name },
        "msg": format!("[{}] changed", name)
    })
    .to_string()
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);
    let (status, body) = call(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_webhook_classifies_isp_outage() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (status, body) = call(&app, post_webhook(heartbeat("Router 192.168.1.1", 1))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["analysis"]["classification"]["type"], "NONE");

    call(&app, post_webhook(heartbeat("Google DNS", 0))).await;
    let (status, body) = call(&app, post_webhook(heartbeat("Cloudflare DNS", 0))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["event_id"].as_i64().unwrap() > 0);
    assert_eq!(body["analysis"]["classification"]["type"], "ISP_OUTAGE");
    assert_eq!(body["analysis"]["classification"]["confidence"], 0.9);

    let (status, body) = call(&app, get("/api/v1/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["classification"]["type"], "ISP_OUTAGE");

    let (_, body) = call(&app, get("/api/v1/outages?limit=5")).await;
    assert!(body["meta"]["total"].as_u64().unwrap() >= 1);

    let (_, body) = call(&app, get("/api/v1/probes")).await;
    assert_eq!(body["meta"]["total"], 3);
}

#[tokio::test]
async fn test_malformed_payloads_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (status, body) = call(&app, post_webhook("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = call(&app, post_webhook(json!({ "heartbeat": { "status": 1 } }).to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, post_webhook(heartbeat("Google DNS", 2))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was stored.
    let (_, body) = call(&app, get("/api/v1/report")).await;
    assert_eq!(body["data"]["events"]["total"], 0);
}

#[tokio::test]
async fn test_unknown_route() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);
    let (status, _) = call(&app, get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
