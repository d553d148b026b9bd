//! Outbound notifications: message values, rendering, and delivery sinks.

pub mod format;
pub mod telegram;

pub use self::telegram::TelegramSink;

use crate::detect::Classification;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery transport failed: {0}")]
    Transport(String),
    #[error("delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("delivery sink not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Alert,
    Recovery,
}

/// A probe coming back after an unbroken down-streak.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recovery {
    pub probe_id: String,
    pub down_since: DateTime<Utc>,
    pub recovered_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: chrono::Duration,
    pub response_time: Option<f64>,
}

fn serialize_secs<S: serde::Serializer>(d: &chrono::Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.num_milliseconds() as f64 / 1000.0)
}

/// What a message is about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Subject {
    Alert(Classification),
    Recovery(Recovery),
}

/// A fully rendered notification, ready for a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub subject: Subject,
    pub content: String,
}

impl OutboundMessage {
    pub fn alert(classification: Classification) -> Self {
        let content = format::render_alert(&classification);
        Self {
            subject: Subject::Alert(classification),
            content,
        }
    }

    pub fn recovery(recovery: Recovery) -> Self {
        let content = format::render_recovery(&recovery);
        Self {
            subject: Subject::Recovery(recovery),
            content,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self.subject {
            Subject::Alert(_) => MessageKind::Alert,
            Subject::Recovery(_) => MessageKind::Recovery,
        }
    }

    pub fn as_alert(&self) -> Option<&Classification> {
        match &self.subject {
            Subject::Alert(c) => Some(c),
            Subject::Recovery(_) => None,
        }
    }

    pub fn as_recovery(&self) -> Option<&Recovery> {
        match &self.subject {
            Subject::Recovery(r) => Some(r),
            Subject::Alert(_) => None,
        }
    }
}

/// Outbound channel for rendered messages. Retries, if any, live here.
#[async_trait::async_trait]
pub trait DeliverySink: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Writes messages to the log. Used when no chat credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait::async_trait]
impl DeliverySink for LogSink {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        tracing::info!(kind = ?message.kind(), "{}", message.content);
        Ok(())
    }
}
