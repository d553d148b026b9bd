//! End-to-end outage scenarios through the analysis engine with a real
//! SQLite store and a recording sink.

use chrono::{DateTime, Duration, TimeZone, Utc};
use outagewatch::detect::engine::{AnalysisEngine, Evaluation};
use outagewatch::detect::{NotificationGate, OutageType};
use outagewatch::notify::{DeliveryError, DeliverySink, MessageKind, OutboundMessage};
use outagewatch::probes::{Event, PatternRoleClassifier, ProbeRegistry};
use outagewatch::storage::{self, EventStore, OutageLog};
use std::sync::{Arc, Mutex};

const ROUTER: &str = "Router 192.168.1.1";
const DNS1: &str = "Google DNS";
const DNS2: &str = "Cloudflare DNS";

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSink {
    fn of_kind(&self, kind: MessageKind) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.kind() == kind)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl DeliverySink for RecordingSink {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Refuses every message, like a chat API answering 400.
struct RejectingSink;

#[async_trait::async_trait]
impl DeliverySink for RejectingSink {
    async fn send(&self, _message: &OutboundMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError::Rejected {
            status: 400,
            body: "Bad Request: can't parse entities".to_string(),
        })
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: EventStore,
    outages: OutageLog,
    registry: ProbeRegistry,
    sink: Arc<RecordingSink>,
    engine: AnalysisEngine,
}

impl Harness {
    fn new() -> Self {
        let sink = Arc::new(RecordingSink::default());
        Self::with_sink(sink.clone(), sink)
    }

    fn with_sink(delivery: Arc<dyn DeliverySink>, sink: Arc<RecordingSink>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = storage::open_pool(dir.path().join("events.db").to_str().unwrap()).unwrap();
        let store = EventStore::new(pool.clone());
        let registry = ProbeRegistry::new(Arc::new(PatternRoleClassifier::default()));
        let engine = AnalysisEngine::new(
            store.clone(),
            registry.clone(),
            NotificationGate::new(Duration::minutes(5)),
            delivery,
            Duration::minutes(5),
        );
        Self {
            _dir: dir,
            store,
            outages: OutageLog::new(pool),
            registry,
            sink,
            engine,
        }
    }

    /// Store the event and push it through the engine, as ingestion does.
    async fn push(&mut self, event: Event) -> Evaluation {
        self.registry.register(&event.probe_id);
        let id = self.store.append(&event).unwrap();
        self.engine.observe(Some(id), &event).await.unwrap()
    }
}

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

#[tokio::test]
async fn test_isp_outage_then_power_outage() {
    let mut h = Harness::new();
    h.push(Event::up(ROUTER, 2.0, t(0))).await;
    h.push(Event::down(DNS1, t(0))).await;
    let eval = h.push(Event::down(DNS2, t(0))).await;

    let c = &eval.classification;
    assert_eq!(c.outage_type, OutageType::IspOutage);
    assert_eq!(c.confidence, 0.9);
    assert_eq!(
        c.affected.iter().map(String::as_str).collect::<Vec<_>>(),
        vec![DNS2, DNS1]
    );
    let alerts_before = h.sink.of_kind(MessageKind::Alert).len();
    assert!(alerts_before >= 1);

    // Identical condition one minute later: suppressed by cooldown.
    let eval = h.engine.evaluate(t(60)).await.unwrap();
    assert_eq!(eval.classification.outage_type, OutageType::IspOutage);
    assert!(eval.deliveries.is_empty());
    assert_eq!(h.sink.of_kind(MessageKind::Alert).len(), alerts_before);

    // Router drops too: different key, emitted immediately.
    let eval = h.push(Event::down(ROUTER, t(60))).await;
    assert_eq!(eval.classification.outage_type, OutageType::PowerOutage);
    assert_eq!(eval.deliveries.len(), 1);
    assert!(eval.deliveries[0].delivered);

    let alerts = h.sink.of_kind(MessageKind::Alert);
    assert_eq!(alerts.len(), alerts_before + 1);
    let last = alerts.last().unwrap().as_alert().unwrap();
    assert_eq!(last.affected.len(), 3);
}

#[tokio::test]
async fn test_observed_event_is_annotated() {
    let mut h = Harness::new();
    let event = Event::down(DNS1, t(0));
    h.registry.register(DNS1);
    let id = h.store.append(&event).unwrap();
    assert_eq!(h.store.analysis_of(id).unwrap(), None);

    h.engine.observe(Some(id), &event).await.unwrap();
    assert_eq!(h.store.analysis_of(id).unwrap(), Some(OutageType::PartialOutage));
}

#[tokio::test]
async fn test_power_outage_and_independent_recoveries() {
    let mut h = Harness::new();
    for probe in [ROUTER, DNS1, DNS2] {
        h.push(Event::down(probe, t(0))).await;
    }

    let eval = h.engine.evaluate(t(1)).await.unwrap();
    assert_eq!(eval.classification.outage_type, OutageType::PowerOutage);
    assert_eq!(eval.classification.confidence, 0.95);
    assert!(!h.outages.recent(10).unwrap().is_empty());

    for probe in [ROUTER, DNS1, DNS2] {
        h.push(Event::up(probe, 15.0, t(300))).await;
    }

    let recoveries = h.sink.of_kind(MessageKind::Recovery);
    assert_eq!(recoveries.len(), 3);
    for msg in &recoveries {
        let r = msg.as_recovery().unwrap();
        assert_eq!(r.duration, Duration::seconds(300));
        assert_eq!(r.down_since, t(0));
    }
    assert!(h.engine.gate().down_probes().is_empty());

    // Every recorded outage is closed once all of its probes are back.
    for outage in h.outages.recent(10).unwrap() {
        assert_eq!(outage.end_time, Some(t(300)), "outage {} still open", outage.id);
    }

    let eval = h.engine.evaluate(t(301)).await.unwrap();
    assert_eq!(eval.classification.outage_type, OutageType::None);
    assert_eq!(eval.classification.confidence, 1.0);
}

#[tokio::test]
async fn test_flapping_probe_reports_each_streak() {
    let mut h = Harness::new();
    h.push(Event::up(ROUTER, 1.0, t(0))).await;
    h.push(Event::up(DNS2, 12.0, t(0))).await;

    h.push(Event::down(DNS1, t(0))).await;
    h.push(Event::up(DNS1, 10.0, t(10))).await;
    h.push(Event::down(DNS1, t(20))).await;
    h.push(Event::up(DNS1, 10.0, t(40))).await;

    let durations: Vec<Duration> = h
        .sink
        .of_kind(MessageKind::Recovery)
        .iter()
        .map(|m| m.as_recovery().unwrap().duration)
        .collect();
    assert_eq!(durations, vec![Duration::seconds(10), Duration::seconds(20)]);
}

#[tokio::test]
async fn test_silent_probe_is_missing_not_down() {
    let mut h = Harness::new();
    h.registry.register(DNS2);
    h.push(Event::up(ROUTER, 1.0, t(0))).await;
    let eval = h.push(Event::up(DNS1, 9.0, t(0))).await;

    assert_eq!(eval.classification.outage_type, OutageType::None);
    assert_eq!(eval.missing, vec![DNS2.to_string()]);
    assert!(h.sink.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_engine_task_serializes_requests() {
    let h = Harness::new();
    let store = h.store.clone();
    let registry = h.registry.clone();
    let sink = h.sink.clone();
    let (handle, _task) = h.engine.spawn();

    for probe in [ROUTER, DNS1, DNS2] {
        let event = Event::down(probe, t(0));
        registry.register(probe);
        let id = store.append(&event).unwrap();
        handle.observe(Some(id), event).await.unwrap();
    }
    let eval = handle.evaluate(t(5)).await.unwrap();
    assert_eq!(eval.classification.outage_type, OutageType::PowerOutage);
    assert!(!sink.of_kind(MessageKind::Alert).is_empty());
}

#[tokio::test]
async fn test_late_down_does_not_leave_phantom_streak() {
    let mut h = Harness::new();
    h.registry.register(DNS1);
    let down = Event::down(DNS1, t(0));
    let up = Event::up(DNS1, 11.0, t(10));
    let down_id = h.store.append(&down).unwrap();
    let up_id = h.store.append(&up).unwrap();

    // Ingestion stamped DOWN first but UP won the race to the queue.
    h.engine.observe(Some(up_id), &up).await.unwrap();
    let eval = h.engine.observe(Some(down_id), &down).await.unwrap();

    assert_eq!(eval.classification.outage_type, OutageType::None);
    assert!(eval.deliveries.is_empty());
    assert_eq!(h.engine.gate().down_since(DNS1), None);
    assert!(h.sink.sent.lock().unwrap().is_empty());

    // The next UP is not mistaken for a recovery.
    h.push(Event::up(DNS1, 10.0, t(20))).await;
    assert!(h.sink.of_kind(MessageKind::Recovery).is_empty());
}

#[tokio::test]
async fn test_failed_delivery_keeps_gate_state() {
    let mut h = Harness::with_sink(Arc::new(RejectingSink), Arc::new(RecordingSink::default()));
    h.push(Event::up(ROUTER, 1.0, t(0))).await;
    let eval = h.push(Event::down(DNS1, t(0))).await;

    assert_eq!(eval.classification.outage_type, OutageType::IspOutage);
    assert_eq!(eval.deliveries.len(), 1);
    assert_eq!(eval.deliveries[0].kind, MessageKind::Alert);
    assert!(!eval.deliveries[0].delivered);
    assert!(eval.deliveries[0].error.as_deref().unwrap().contains("400"));

    // Still counted as sent: the identical verdict stays suppressed.
    let eval = h.engine.evaluate(t(120)).await.unwrap();
    assert_eq!(eval.classification.outage_type, OutageType::IspOutage);
    assert!(eval.deliveries.is_empty());
    assert_eq!(h.engine.gate().down_since(DNS1), Some(t(0)));

    // Recovery is still produced and attempted.
    let eval = h.push(Event::up(DNS1, 14.0, t(180))).await;
    assert_eq!(eval.deliveries.len(), 1);
    assert_eq!(eval.deliveries[0].kind, MessageKind::Recovery);
    assert!(!eval.deliveries[0].delivered);
    assert_eq!(h.engine.gate().down_since(DNS1), None);
}
