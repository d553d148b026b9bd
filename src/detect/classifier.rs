//! Root-cause classification over a window of probe statuses.
//!
//! The verdict comes from a fixed decision table evaluated top to bottom;
//! the first rule that matches wins, which is what breaks ties between
//! overlapping causes. Confidence is a constant per rule: it expresses how
//! sure we are that the pattern matches, not how bad the outage is.

use super::{Classification, DetectError, OutageType, WindowView};
use crate::probes::{ProbeRegistry, ProbeRole};
use std::collections::BTreeSet;

pub const POWER_OUTAGE_CONFIDENCE: f64 = 0.95;
pub const ISP_OUTAGE_CONFIDENCE: f64 = 0.90;
pub const ROUTER_FAILURE_CONFIDENCE: f64 = 0.80;
pub const PARTIAL_OUTAGE_MAX_CONFIDENCE: f64 = 0.90;

/// What the router probes say, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouterSignal {
    Absent,
    Up,
    Down,
}

/// The window reduced to the facts the rules look at.
#[derive(Debug)]
struct Signals<'a> {
    router: RouterSignal,
    routers_down: Vec<&'a str>,
    external_present: usize,
    external_down: Vec<&'a str>,
}

impl Signals<'_> {
    fn all_external_down(&self) -> bool {
        self.external_down.len() == self.external_present
    }

    fn all_external_up(&self) -> bool {
        self.external_down.is_empty()
    }
}

struct Verdict {
    outage_type: OutageType,
    confidence: f64,
    affected: BTreeSet<String>,
    reason: String,
}

struct Rule {
    name: &'static str,
    apply: fn(&Signals<'_>) -> Option<Verdict>,
}

/// Evaluated in order, first match wins.
const RULES: &[Rule] = &[
    Rule { name: "power_outage", apply: power_outage },
    Rule { name: "isp_outage", apply: isp_outage },
    Rule { name: "router_failure", apply: router_failure },
    Rule { name: "partial_outage", apply: partial_outage },
];

fn ids<S: AsRef<str>>(it: impl IntoIterator<Item = S>) -> BTreeSet<String> {
    it.into_iter().map(|s| s.as_ref().to_string()).collect()
}

/// Router down and every reporting external service down.
fn power_outage(s: &Signals<'_>) -> Option<Verdict> {
    if s.router != RouterSignal::Down || !s.all_external_down() {
        return None;
    }
    let affected = ids(s.routers_down.iter().chain(s.external_down.iter()));
    Some(Verdict {
        outage_type: OutageType::PowerOutage,
        confidence: POWER_OUTAGE_CONFIDENCE,
        affected,
        reason: "Router and external services are down".to_string(),
    })
}

/// Router up but every reporting external service down.
fn isp_outage(s: &Signals<'_>) -> Option<Verdict> {
    if s.router != RouterSignal::Up || s.external_present == 0 || !s.all_external_down() {
        return None;
    }
    Some(Verdict {
        outage_type: OutageType::IspOutage,
        confidence: ISP_OUTAGE_CONFIDENCE,
        affected: ids(s.external_down.iter()),
        reason: "Internet services down but router is up".to_string(),
    })
}

/// Router down while every reporting external service is up.
fn router_failure(s: &Signals<'_>) -> Option<Verdict> {
    if s.router != RouterSignal::Down || !s.all_external_up() {
        return None;
    }
    Some(Verdict {
        outage_type: OutageType::RouterFailure,
        confidence: ROUTER_FAILURE_CONFIDENCE,
        affected: ids(s.routers_down.iter()),
        reason: "Only router is down".to_string(),
    })
}

/// Some external services down, whatever the router says. Also catches
/// "every external down" when no router has reported, since the cause
/// cannot be attributed without a router signal.
fn partial_outage(s: &Signals<'_>) -> Option<Verdict> {
    if s.external_down.is_empty() {
        return None;
    }
    let down = s.external_down.len();
    Some(Verdict {
        outage_type: OutageType::PartialOutage,
        confidence: partial_outage_confidence(down),
        affected: ids(s.external_down.iter()),
        reason: format!(
            "{} of {} external services affected",
            down, s.external_present
        ),
    })
}

/// `0.50 + 0.10 * min(down, 4)`, never above 0.90.
pub fn partial_outage_confidence(down_count: usize) -> f64 {
    let steps = down_count.min(4) as f64;
    ((5.0 + steps) / 10.0).min(PARTIAL_OUTAGE_MAX_CONFIDENCE)
}

/// Classify the failure pattern in `window`.
///
/// Every probe in the window must be known to `known`; an unknown id is
/// rejected rather than guessed at. Known probes that are absent from the
/// window are simply not considered.
pub fn classify(window: &WindowView, known: &ProbeRegistry) -> Result<Classification, DetectError> {
    let evaluated_at = window.taken_at;

    let mut router_present = false;
    let mut signals = Signals {
        router: RouterSignal::Absent,
        routers_down: Vec::new(),
        external_present: 0,
        external_down: Vec::new(),
    };

    for obs in window.iter() {
        let role = known
            .role(&obs.probe_id)
            .ok_or_else(|| DetectError::UnknownProbe(obs.probe_id.clone()))?;
        match role {
            ProbeRole::Router => {
                router_present = true;
                if obs.status.is_down() {
                    signals.routers_down.push(&obs.probe_id);
                }
            }
            ProbeRole::ExternalService => {
                signals.external_present += 1;
                if obs.status.is_down() {
                    signals.external_down.push(&obs.probe_id);
                }
            }
        }
    }

    if window.is_empty() {
        return Ok(Classification {
            outage_type: OutageType::None,
            confidence: 0.0,
            affected: BTreeSet::new(),
            reason: "No recent events".to_string(),
            evaluated_at,
        });
    }

    signals.router = match (router_present, signals.routers_down.is_empty()) {
        (false, _) => RouterSignal::Absent,
        (true, true) => RouterSignal::Up,
        (true, false) => RouterSignal::Down,
    };

    for rule in RULES {
        if let Some(v) = (rule.apply)(&signals) {
            tracing::debug!(rule = rule.name, confidence = v.confidence, "Classification rule matched");
            return Ok(Classification {
                outage_type: v.outage_type,
                confidence: v.confidence,
                affected: v.affected,
                reason: v.reason,
                evaluated_at,
            });
        }
    }

    Ok(Classification {
        outage_type: OutageType::None,
        confidence: 1.0,
        affected: BTreeSet::new(),
        reason: "All services operational".to_string(),
        evaluated_at,
    })
}
