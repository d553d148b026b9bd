//! Read-only API route definitions.

use super::state::AppState;
use super::ApiError;
use crate::detect::engine::snapshot;
use crate::report;
use axum::extract::{Query, State};
use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/report", get(daily_report))
        .route("/uptime", get(uptime))
        .route("/outages", get(list_outages))
        .route("/probes", get(list_probes))
}

fn meta() -> Value {
    json!({
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": { "status": "ok" },
        "meta": meta()
    }))
}

async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let (classification, missing) =
        snapshot(&state.store, &state.registry, state.window, Utc::now()).await?;
    Ok(Json(json!({
        "data": {
            "classification": classification,
            "missing": missing,
            "window_secs": state.window.num_seconds(),
        },
        "meta": meta()
    })))
}

async fn daily_report(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let report = tokio::task::spawn_blocking(move || {
        report::daily_report(&state.store, &state.outages, Utc::now())
    })
    .await
    .map_err(anyhow::Error::from)??;
    Ok(Json(json!({ "data": report, "meta": meta() })))
}

async fn uptime(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let report = tokio::task::spawn_blocking(move || report::uptime_report(&state.store, Utc::now()))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(Json(json!({ "data": report, "meta": meta() })))
}

#[derive(Debug, Deserialize)]
struct OutageQuery {
    limit: Option<usize>,
}

async fn list_outages(
    State(state): State<AppState>,
    Query(q): Query<OutageQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(20).min(500);
    let list = tokio::task::spawn_blocking(move || state.outages.recent(limit))
        .await
        .map_err(anyhow::Error::from)??;
    let total = list.len();
    Ok(Json(json!({ "data": list, "meta": { "total": total } })))
}

async fn list_probes(State(state): State<AppState>) -> Json<Value> {
    let probes = state.registry.probes();
    let total = probes.len();
    Json(json!({ "data": probes, "meta": { "total": total } }))
}
