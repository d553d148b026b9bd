//! Outage classification and notification gating.

pub mod classifier;
pub mod engine;
pub mod gate;
pub mod window;

pub use self::classifier::classify;
pub use self::gate::NotificationGate;
pub use self::window::{Observation, WindowView};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Precondition violations on classifier input. Rejected, never coerced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetectError {
    #[error("malformed input: probe '{0}' appears more than once in the window")]
    DuplicateProbe(String),
    #[error("malformed input: probe '{0}' is not a known probe")]
    UnknownProbe(String),
}

/// Root-cause categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutageType {
    None,
    PowerOutage,
    IspOutage,
    RouterFailure,
    PartialOutage,
}

impl OutageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutageType::None => "NONE",
            OutageType::PowerOutage => "POWER_OUTAGE",
            OutageType::IspOutage => "ISP_OUTAGE",
            OutageType::RouterFailure => "ROUTER_FAILURE",
            OutageType::PartialOutage => "PARTIAL_OUTAGE",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            OutageType::PowerOutage => Severity::Critical,
            OutageType::IspOutage | OutageType::RouterFailure => Severity::High,
            OutageType::PartialOutage => Severity::Medium,
            OutageType::None => Severity::Info,
        }
    }
}

impl std::fmt::Display for OutageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(OutageType::None),
            "POWER_OUTAGE" => Ok(OutageType::PowerOutage),
            "ISP_OUTAGE" => Ok(OutageType::IspOutage),
            "ROUTER_FAILURE" => Ok(OutageType::RouterFailure),
            "PARTIAL_OUTAGE" => Ok(OutageType::PartialOutage),
            other => anyhow::bail!("unknown outage type '{}'", other),
        }
    }
}

/// Severity levels for alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// The classifier's verdict on one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub outage_type: OutageType,
    pub confidence: f64,
    /// DOWN probes relevant to the verdict, in sorted order.
    pub affected: BTreeSet<String>,
    pub reason: String,
    pub evaluated_at: DateTime<Utc>,
}

impl Classification {
    pub fn is_anomaly(&self) -> bool {
        self.outage_type != OutageType::None
    }

    pub fn severity(&self) -> Severity {
        self.outage_type.severity()
    }
}
