//! Uptime Kuma webhook ingestion.

use super::state::AppState;
use super::ApiError;
use crate::probes::{Event, ProbeStatus};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook", post(receive_webhook))
}

#[derive(Debug, Default, Deserialize)]
pub struct Heartbeat {
    pub status: Option<Value>,
    pub ping: Option<f64>,
    pub msg: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Monitor {
    pub name: Option<String>,
}

/// Either the nested Uptime Kuma notification shape or the older flat one.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub heartbeat: Option<Heartbeat>,
    pub monitor: Option<Monitor>,
    #[serde(rename = "monitorName")]
    pub monitor_name: Option<String>,
    pub status: Option<Value>,
    pub ping: Option<f64>,
    pub msg: Option<String>,
}

fn parse_status(v: &Value) -> Result<ProbeStatus, ApiError> {
    let parsed = match v {
        Value::Number(n) => match n.as_u64() {
            Some(1) => Some(ProbeStatus::Up),
            Some(0) => Some(ProbeStatus::Down),
            _ => None,
        },
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ApiError::InvalidPayload(format!("unsupported status {}", v)))
}

impl WebhookPayload {
    /// Validate the payload and turn it into an event observed at `at`.
    pub fn into_event(self, at: DateTime<Utc>) -> Result<Event, ApiError> {
        let heartbeat = self.heartbeat.unwrap_or_default();

        let name = self
            .monitor
            .and_then(|m| m.name)
            .or(self.monitor_name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::InvalidPayload("missing monitor name".to_string()))?;

        let status = heartbeat
            .status
            .as_ref()
            .or(self.status.as_ref())
            .ok_or_else(|| ApiError::InvalidPayload("missing status".to_string()))
            .and_then(parse_status)?;

        let response_time = match status {
            ProbeStatus::Up => match heartbeat.ping.or(self.ping) {
                Some(ms) if ms < 0.0 || !ms.is_finite() => {
                    return Err(ApiError::InvalidPayload(format!("invalid response time {}", ms)));
                }
                other => other,
            },
            ProbeStatus::Down => None,
        };

        let message = heartbeat.msg.or(self.msg).unwrap_or_default();

        Ok(Event {
            probe_id: name,
            status,
            response_time,
            timestamp: at,
            message,
        })
    }
}

async fn receive_webhook(
    State(state): State<AppState>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    let event = payload.into_event(Utc::now())?;

    let role = state.registry.register(&event.probe_id);
    debug!(probe = %event.probe_id, %role, status = %event.status, "Webhook received");

    let store = state.store.clone();
    let stored = event.clone();
    let event_id = tokio::task::spawn_blocking(move || store.append(&stored))
        .await
        .map_err(anyhow::Error::from)??;

    let evaluation = state.engine.observe(Some(event_id), event).await?;

    Ok(Json(json!({
        "status": "success",
        "event_id": event_id,
        "analysis": evaluation,
    })))
}
