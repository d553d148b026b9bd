//! History of emitted outage alerts.

use super::{format_ts, parse_ts, Pool};
use crate::detect::{Classification, OutageType};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageRecord {
    pub id: i64,
    pub outage_type: OutageType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub affected: Vec<String>,
    pub confidence: f64,
}

/// Per-type counts for reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageSummary {
    pub outage_type: OutageType,
    pub count: u64,
    pub avg_confidence: f64,
}

#[derive(Clone)]
pub struct OutageLog {
    pool: Pool,
}

impl OutageLog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Record an alerted classification as an open outage.
    pub fn record(&self, c: &Classification) -> Result<i64> {
        let conn = self.pool.get()?;
        let affected = serde_json::to_string(&c.affected)?;
        conn.execute(
            "INSERT INTO outage_analysis (outage_type, start_time, affected_monitors, confidence_score)
             VALUES (?1, ?2, ?3, ?4)",
            params![c.outage_type.as_str(), format_ts(c.evaluated_at), affected, c.confidence],
        )
        .context("Failed to record outage")?;
        Ok(conn.last_insert_rowid())
    }

    /// Close every open outage involving `probe_id` whose affected probes are
    /// all out of `still_down`. Returns the ids closed.
    pub fn close_recovered(
        &self,
        probe_id: &str,
        at: DateTime<Utc>,
        still_down: &BTreeSet<String>,
    ) -> Result<Vec<i64>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let open: Vec<(i64, String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT id, start_time, affected_monitors FROM outage_analysis WHERE end_time IS NULL",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
            let open = rows.collect::<Result<_, _>>()?;
            open
        };

        let mut closed = Vec::new();
        for (id, start, affected_json) in open {
            let affected: Vec<String> = serde_json::from_str(&affected_json).unwrap_or_default();
            if !affected.iter().any(|p| p == probe_id) {
                continue;
            }
            if affected.iter().any(|p| still_down.contains(p)) {
                continue;
            }
            let start = parse_ts(&start)?;
            let duration = (at - start).num_seconds().max(0);
            tx.execute(
                "UPDATE outage_analysis SET end_time = ?1, duration_secs = ?2 WHERE id = ?3",
                params![format_ts(at), duration, id],
            )?;
            debug!(outage_id = id, duration_secs = duration, "Outage closed");
            closed.push(id);
        }

        tx.commit()?;
        Ok(closed)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<OutageRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, outage_type, start_time, end_time, duration_secs, affected_monitors, confidence_score
             FROM outage_analysis ORDER BY start_time DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<i64>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, f64>(6)?,
            ))
        })?;

        let mut list = Vec::new();
        for r in rows {
            let (id, kind, start, end, duration_secs, affected, confidence) = r?;
            list.push(OutageRecord {
                id,
                outage_type: kind.parse()?,
                start_time: parse_ts(&start)?,
                end_time: end.as_deref().map(parse_ts).transpose()?,
                duration_secs,
                affected: serde_json::from_str(&affected).unwrap_or_default(),
                confidence,
            });
        }
        Ok(list)
    }

    pub fn summary_since(&self, since: DateTime<Utc>) -> Result<Vec<OutageSummary>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT outage_type, COUNT(*), AVG(confidence_score)
             FROM outage_analysis
             WHERE start_time > ?1
             GROUP BY outage_type
             ORDER BY outage_type",
        )?;
        let rows = stmt.query_map(params![format_ts(since)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;
        let mut list = Vec::new();
        for r in rows {
            let (kind, count, avg) = r?;
            list.push(OutageSummary {
                outage_type: kind.parse()?,
                count: count as u64,
                avg_confidence: avg,
            });
        }
        Ok(list)
    }
}
