//! The analysis pipeline: event store -> window -> classifier -> gate -> sink.
//!
//! The gate's state must not be touched by two evaluations at once, so the
//! engine runs as one task that drains a queue. Ingestion and the periodic
//! tick both talk to it through an [`EngineHandle`].

use super::{classify, Classification, NotificationGate};
use crate::notify::{DeliverySink, MessageKind, OutboundMessage};
use crate::probes::{Event, ProbeRegistry};
use crate::storage::{EventStore, OutageLog};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const QUEUE_DEPTH: usize = 256;

/// Outcome of handing one message to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub kind: MessageKind,
    pub delivered: bool,
    pub error: Option<String>,
}

/// Result of one pass through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub classification: Classification,
    /// Known probes with no heartbeat inside the window.
    pub missing: Vec<String>,
    pub deliveries: Vec<DeliveryReport>,
}

/// Run `f` against the store on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Classify the current window without touching any gate state.
pub async fn snapshot(
    store: &EventStore,
    registry: &ProbeRegistry,
    window: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<(Classification, Vec<String>)> {
    let s = store.clone();
    let view = blocking(move || s.latest_statuses(now - window, now)).await?;
    let missing = view.missing_probes(registry);
    let classification = classify(&view, registry).context("window failed validation")?;
    Ok((classification, missing))
}

pub struct AnalysisEngine {
    store: EventStore,
    outages: OutageLog,
    registry: ProbeRegistry,
    gate: NotificationGate,
    sink: Arc<dyn DeliverySink>,
    window: chrono::Duration,
    /// Latest evaluation time so far. Never moves backwards.
    clock: Option<DateTime<Utc>>,
}

impl AnalysisEngine {
    pub fn new(
        store: EventStore,
        registry: ProbeRegistry,
        gate: NotificationGate,
        sink: Arc<dyn DeliverySink>,
        window: chrono::Duration,
    ) -> Self {
        let outages = OutageLog::new(store.pool().clone());
        Self {
            store,
            outages,
            registry,
            gate,
            sink,
            window,
            clock: None,
        }
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    /// Process one newly stored event: recovery bookkeeping first, then a
    /// full evaluation at the event's timestamp.
    pub async fn observe(&mut self, event_id: Option<i64>, event: &Event) -> Result<Evaluation> {
        let mut deliveries = Vec::new();

        if let Some(msg) = self.gate.on_probe_status(event) {
            self.close_outages(event).await;
            deliveries.push(self.deliver(&msg).await);
        }

        let mut eval = self.evaluate(event.timestamp).await?;
        deliveries.append(&mut eval.deliveries);
        eval.deliveries = deliveries;

        if let Some(id) = event_id {
            let store = self.store.clone();
            let kind = eval.classification.outage_type;
            if let Err(e) = blocking(move || store.set_analysis(id, kind)).await {
                warn!(event_id = id, "Failed to annotate event: {:#}", e);
            }
        }

        Ok(eval)
    }

    fn advance(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        let now = match self.clock {
            Some(clock) if clock > at => clock,
            _ => at,
        };
        self.clock = Some(now);
        now
    }

    /// Classify the window ending at `now` and pass the verdict to the gate.
    /// A `now` earlier than a previous evaluation is raised to it, so a late
    /// event cannot make the gate act on an outdated window.
    pub async fn evaluate(&mut self, now: DateTime<Utc>) -> Result<Evaluation> {
        let now = self.advance(now);
        let (classification, missing) =
            snapshot(&self.store, &self.registry, self.window, now).await?;

        if !missing.is_empty() {
            debug!(missing = ?missing, "Insufficient data for some probes in window");
        }

        let mut deliveries = Vec::new();
        if let Some(msg) = self.gate.on_classification(&classification) {
            let outages = self.outages.clone();
            let c = classification.clone();
            if let Err(e) = blocking(move || outages.record(&c)).await {
                error!("Failed to record outage: {:#}", e);
            }
            deliveries.push(self.deliver(&msg).await);
        }

        Ok(Evaluation {
            classification,
            missing,
            deliveries,
        })
    }

    async fn close_outages(&self, event: &Event) {
        let outages = self.outages.clone();
        let probe = event.probe_id.clone();
        let at = event.timestamp;
        let still_down = self.gate.down_probes();
        match blocking(move || outages.close_recovered(&probe, at, &still_down)).await {
            Ok(closed) if !closed.is_empty() => {
                info!(probe = %event.probe_id, outages = ?closed, "Outages resolved");
            }
            Ok(_) => {}
            Err(e) => error!("Failed to close outages: {:#}", e),
        }
    }

    /// Hand a message to the sink. The gate already counts it as sent.
    async fn deliver(&self, msg: &OutboundMessage) -> DeliveryReport {
        match self.sink.send(msg).await {
            Ok(()) => DeliveryReport {
                kind: msg.kind(),
                delivered: true,
                error: None,
            },
            Err(e) => {
                warn!(kind = ?msg.kind(), "Delivery failed: {}", e);
                DeliveryReport {
                    kind: msg.kind(),
                    delivered: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Move the engine onto its own task and return a handle to its queue.
    pub fn spawn(mut self) -> (EngineHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Command>(QUEUE_DEPTH);
        let task = tokio::spawn(async move {
            info!(
                cooldown_secs = self.gate.cooldown().num_seconds(),
                window_secs = self.window.num_seconds(),
                "Analysis engine started"
            );
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Observe {
                        event_id,
                        event,
                        reply,
                    } => {
                        let res = self.observe(event_id, &event).await;
                        let _ = reply.send(res);
                    }
                    Command::Evaluate { now, reply } => {
                        let res = self.evaluate(now).await;
                        let _ = reply.send(res);
                    }
                }
            }
            info!("Analysis engine stopped");
        });
        (EngineHandle { tx }, task)
    }
}

enum Command {
    Observe {
        event_id: Option<i64>,
        event: Event,
        reply: oneshot::Sender<Result<Evaluation>>,
    },
    Evaluate {
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<Evaluation>>,
    },
}

/// Cloneable front door to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    pub async fn observe(&self, event_id: Option<i64>, event: Event) -> Result<Evaluation> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Observe {
                event_id,
                event,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("analysis engine is not running"))?;
        rx.await.context("analysis engine dropped the request")?
    }

    pub async fn evaluate(&self, now: DateTime<Utc>) -> Result<Evaluation> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Evaluate { now, reply })
            .await
            .map_err(|_| anyhow::anyhow!("analysis engine is not running"))?;
        rx.await.context("analysis engine dropped the request")?
    }

    /// Re-evaluate every `period` so that conditions are caught even when no
    /// new events arrive.
    pub fn spawn_ticker(&self, period: Duration) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match handle.evaluate(Utc::now()).await {
                    Ok(eval) => debug!(verdict = %eval.classification.outage_type, "Periodic evaluation"),
                    Err(e) => {
                        error!("Periodic evaluation failed: {:#}", e);
                        if handle.tx.is_closed() {
                            break;
                        }
                    }
                }
            }
        })
    }
}
