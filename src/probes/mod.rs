//! Probe identities, heartbeat events, and role derivation.

pub mod registry;
pub mod role;

pub use self::registry::ProbeRegistry;
pub use self::role::{PatternRoleClassifier, RoleClassifier};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a probe watches: the local router, or something beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeRole {
    Router,
    ExternalService,
}

impl std::fmt::Display for ProbeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeRole::Router => write!(f, "router"),
            ProbeRole::ExternalService => write!(f, "external_service"),
        }
    }
}

/// Heartbeat status reported by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Up => "up",
            ProbeStatus::Down => "down",
        }
    }

    pub fn is_down(&self) -> bool {
        matches!(self, ProbeStatus::Down)
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProbeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "1" => Ok(ProbeStatus::Up),
            "down" | "0" => Ok(ProbeStatus::Down),
            other => anyhow::bail!("unknown probe status '{}'", other),
        }
    }
}

/// One monitored target. The role is fixed when the probe is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Probe {
    pub id: String,
    pub role: ProbeRole,
}

/// One observed heartbeat. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub probe_id: String,
    pub status: ProbeStatus,
    /// Milliseconds; only present for UP heartbeats.
    pub response_time: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl Event {
    pub fn up(probe_id: &str, response_time: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            probe_id: probe_id.to_string(),
            status: ProbeStatus::Up,
            response_time: Some(response_time),
            timestamp,
            message: String::new(),
        }
    }

    pub fn down(probe_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            probe_id: probe_id.to_string(),
            status: ProbeStatus::Down,
            response_time: None,
            timestamp,
            message: String::new(),
        }
    }
}
