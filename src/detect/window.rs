//! Latest-status-per-probe views over a trailing window.

use super::DetectError;
use crate::probes::{Event, ProbeRegistry, ProbeStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// The most recent status of one probe inside the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub probe_id: String,
    pub status: ProbeStatus,
    pub response_time: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl From<&Event> for Observation {
    fn from(e: &Event) -> Self {
        Self {
            probe_id: e.probe_id.clone(),
            status: e.status,
            response_time: e.response_time,
            timestamp: e.timestamp,
        }
    }
}

/// At most one observation per probe, taken at `taken_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowView {
    pub taken_at: DateTime<Utc>,
    observations: BTreeMap<String, Observation>,
}

impl WindowView {
    /// Build a view from already-reduced observations. A probe id appearing
    /// twice is rejected.
    pub fn from_observations(
        taken_at: DateTime<Utc>,
        observations: impl IntoIterator<Item = Observation>,
    ) -> Result<Self, DetectError> {
        let mut map = BTreeMap::new();
        for o in observations {
            if map.contains_key(&o.probe_id) {
                return Err(DetectError::DuplicateProbe(o.probe_id));
            }
            map.insert(o.probe_id.clone(), o);
        }
        Ok(Self {
            taken_at,
            observations: map,
        })
    }

    pub fn get(&self, probe_id: &str) -> Option<&Observation> {
        self.observations.get(probe_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.values()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Known probes that have not reported inside the window. Absence is
    /// insufficient data, not a failure.
    pub fn missing_probes(&self, known: &ProbeRegistry) -> Vec<String> {
        known
            .probes()
            .into_iter()
            .filter(|p| !self.observations.contains_key(&p.id))
            .map(|p| p.id)
            .collect()
    }
}
