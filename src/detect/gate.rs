//! Cooldown and down-streak bookkeeping between classifications and alerts.

use super::{Classification, OutageType};
use crate::notify::{OutboundMessage, Recovery};
use crate::probes::{Event, ProbeStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

pub const DEFAULT_COOLDOWN_SECS: i64 = 300;

/// Alerts are rate-limited per distinct cause and affected set.
pub type AlertKey = (OutageType, BTreeSet<String>);

#[derive(Debug, Clone)]
struct DownStreak {
    since: DateTime<Utc>,
}

/// Turns classifications into a rate-limited alert stream and per-probe
/// recoveries into recovery notices.
///
/// Takes `&mut self` everywhere: callers own one gate per pipeline and feed
/// it from a single serialized queue.
#[derive(Debug)]
pub struct NotificationGate {
    cooldown: Duration,
    last_alert_sent_at: HashMap<AlertKey, DateTime<Utc>>,
    down_since: HashMap<String, DownStreak>,
    last_seen: HashMap<String, DateTime<Utc>>,
    last_response_time: HashMap<String, f64>,
}

impl Default for NotificationGate {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

impl NotificationGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alert_sent_at: HashMap::new(),
            down_since: HashMap::new(),
            last_seen: HashMap::new(),
            last_response_time: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Decide whether a classification becomes an alert. `evaluated_at` is "now".
    ///
    /// Every affected probe without a down-streak gets one starting now,
    /// whether or not the alert is suppressed.
    pub fn on_classification(&mut self, c: &Classification) -> Option<OutboundMessage> {
        if !c.is_anomaly() {
            return None;
        }
        let now = c.evaluated_at;

        for probe in &c.affected {
            self.down_since
                .entry(probe.clone())
                .or_insert_with(|| DownStreak { since: now });
        }

        let key: AlertKey = (c.outage_type, c.affected.clone());
        if let Some(last) = self.last_alert_sent_at.get(&key) {
            let elapsed = now - *last;
            if elapsed < self.cooldown {
                debug!(
                    outage = %c.outage_type,
                    affected = c.affected.len(),
                    elapsed_secs = elapsed.num_seconds(),
                    "Alert suppressed by cooldown"
                );
                return None;
            }
        }

        self.last_alert_sent_at.insert(key, now);
        info!(
            outage = %c.outage_type,
            confidence = c.confidence,
            affected = ?c.affected,
            "Alert emitted"
        );
        Some(OutboundMessage::alert(c.clone()))
    }

    /// Track a probe's down-streak from its heartbeats. Only a DOWN -> UP
    /// transition produces a message; it is never subject to cooldown.
    ///
    /// A heartbeat older than the newest one already seen for the same probe
    /// arrived out of order and is ignored.
    pub fn on_probe_status(&mut self, event: &Event) -> Option<OutboundMessage> {
        let probe = &event.probe_id;
        let at = event.timestamp;

        if let Some(seen) = self.last_seen.get(probe).copied() {
            if at < seen {
                debug!(probe = %probe, %at, latest = %seen, "Ignoring out-of-order heartbeat");
                return None;
            }
        }
        self.last_seen.insert(probe.clone(), at);

        match event.status {
            ProbeStatus::Down => {
                self.down_since.entry(probe.clone()).or_insert_with(|| {
                    debug!(probe = %probe, %at, "Down-streak started");
                    DownStreak { since: at }
                });
                None
            }
            ProbeStatus::Up => {
                if let Some(rt) = event.response_time {
                    self.last_response_time.insert(probe.clone(), rt);
                }
                let streak = self.down_since.remove(probe)?;
                let mut duration = at - streak.since;
                if duration < Duration::zero() {
                    warn!(probe = %probe, since = %streak.since, %at, "Recovery precedes down-streak start, clamping to zero");
                    duration = Duration::zero();
                }
                info!(probe = %probe, duration_secs = duration.num_seconds(), "Probe recovered");
                Some(OutboundMessage::recovery(Recovery {
                    probe_id: probe.clone(),
                    down_since: streak.since,
                    recovered_at: at,
                    duration,
                    response_time: event
                        .response_time
                        .or_else(|| self.last_response_time.get(probe).copied()),
                }))
            }
        }
    }

    /// Start of the current down-streak for `probe_id`, if it is down.
    pub fn down_since(&self, probe_id: &str) -> Option<DateTime<Utc>> {
        self.down_since.get(probe_id).map(|s| s.since)
    }

    pub fn last_alert_sent_at(&self, key: &AlertKey) -> Option<DateTime<Utc>> {
        self.last_alert_sent_at.get(key).copied()
    }

    /// Probes currently inside a down-streak.
    pub fn down_probes(&self) -> BTreeSet<String> {
        self.down_since.keys().cloned().collect()
    }
}
