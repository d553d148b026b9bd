//! Append-only heartbeat store.

use super::{format_ts, parse_ts, Pool};
use crate::detect::{Observation, OutageType, WindowView};
use crate::probes::{Event, ProbeStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

/// Aggregate counts over a time range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub total: u64,
    pub down: u64,
    /// Mean response time of UP heartbeats, in ms.
    pub avg_response_ms: Option<f64>,
}

impl EventSummary {
    pub fn uptime_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.total - self.down) as f64 / self.total as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeUptime {
    pub probe_id: String,
    pub checks: u64,
    pub up: u64,
}

impl ProbeUptime {
    pub fn uptime_percent(&self) -> f64 {
        if self.checks == 0 {
            return 0.0;
        }
        self.up as f64 / self.checks as f64 * 100.0
    }
}

#[derive(Clone)]
pub struct EventStore {
    pool: Pool,
}

impl EventStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Record a heartbeat and return its row id.
    pub fn append(&self, event: &Event) -> Result<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO events (probe_id, status, response_time, timestamp, message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.probe_id,
                event.status.as_str(),
                event.response_time,
                format_ts(event.timestamp),
                event.message,
            ],
        )
        .context("Failed to insert event")?;
        Ok(conn.last_insert_rowid())
    }

    /// Attach the verdict computed right after this event was ingested.
    pub fn set_analysis(&self, event_id: i64, outage_type: OutageType) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE events SET analysis_type = ?1 WHERE id = ?2",
            params![outage_type.as_str(), event_id],
        )?;
        Ok(())
    }

    pub fn analysis_of(&self, event_id: i64) -> Result<Option<OutageType>> {
        let conn = self.pool.get()?;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT analysis_type FROM events WHERE id = ?1",
                params![event_id],
                |row| row.get(0),
            )
            .optional()?;
        raw.flatten().map(|s| s.parse()).transpose()
    }

    /// Latest status per probe with a timestamp inside `[since, until]`.
    pub fn latest_statuses(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<WindowView> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT probe_id, status, response_time, timestamp FROM (
                SELECT probe_id, status, response_time, timestamp,
                       ROW_NUMBER() OVER (
                           PARTITION BY probe_id ORDER BY timestamp DESC, id DESC
                       ) AS rn
                FROM events
                WHERE timestamp >= ?1 AND timestamp <= ?2
             )
             WHERE rn = 1
             ORDER BY probe_id",
        )?;

        let rows = stmt.query_map(params![format_ts(since), format_ts(until)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut observations = Vec::new();
        for r in rows {
            let (probe_id, status, response_time, ts) = r?;
            observations.push(Observation {
                probe_id,
                status: status.parse::<ProbeStatus>()?,
                response_time,
                timestamp: parse_ts(&ts)?,
            });
        }

        Ok(WindowView::from_observations(until, observations)?)
    }

    /// Every probe id that has ever reported.
    pub fn distinct_probes(&self) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT DISTINCT probe_id FROM events ORDER BY probe_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for r in rows {
            ids.push(r?);
        }
        Ok(ids)
    }

    pub fn summary_since(&self, since: DateTime<Utc>) -> Result<EventSummary> {
        let conn = self.pool.get()?;
        let (total, down, avg) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'down' THEN 1 ELSE 0 END), 0),
                    AVG(CASE WHEN status = 'up' THEN response_time END)
             FROM events
             WHERE timestamp > ?1",
            params![format_ts(since)],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                ))
            },
        )?;
        Ok(EventSummary {
            total: total as u64,
            down: down as u64,
            avg_response_ms: avg,
        })
    }

    pub fn uptime_since(&self, since: DateTime<Utc>) -> Result<Vec<ProbeUptime>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT probe_id,
                    COUNT(*),
                    SUM(CASE WHEN status = 'up' THEN 1 ELSE 0 END)
             FROM events
             WHERE timestamp > ?1
             GROUP BY probe_id
             ORDER BY probe_id",
        )?;
        let rows = stmt.query_map(params![format_ts(since)], |row| {
            Ok(ProbeUptime {
                probe_id: row.get(0)?,
                checks: row.get::<_, i64>(1)? as u64,
                up: row.get::<_, i64>(2)? as u64,
            })
        })?;
        let mut list = Vec::new();
        for r in rows {
            list.push(r?);
        }
        Ok(list)
    }
}
