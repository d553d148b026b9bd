//! Status, 24-hour and 7-day summaries shared by the CLI and the API.

use crate::detect::Classification;
use crate::notify::format::{escape_markdown, RULE};
use crate::storage::events::{EventSummary, ProbeUptime};
use crate::storage::outages::OutageSummary;
use crate::storage::{EventStore, OutageLog};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub since: DateTime<Utc>,
    pub events: EventSummary,
    pub uptime_percent: f64,
    pub outages: Vec<OutageSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UptimeReport {
    pub since: DateTime<Utc>,
    pub probes: Vec<ProbeUptime>,
}

pub fn daily_report(store: &EventStore, outages: &OutageLog, now: DateTime<Utc>) -> Result<DailyReport> {
    let since = now - Duration::days(1);
    let events = store.summary_since(since)?;
    Ok(DailyReport {
        since,
        uptime_percent: events.uptime_percent(),
        events,
        outages: outages.summary_since(since)?,
    })
}

pub fn uptime_report(store: &EventStore, now: DateTime<Utc>) -> Result<UptimeReport> {
    let since = now - Duration::days(7);
    Ok(UptimeReport {
        since,
        probes: store.uptime_since(since)?,
    })
}

pub fn uptime_icon(percent: f64) -> &'static str {
    if percent > 99.0 {
        "✅"
    } else if percent > 95.0 {
        "⚠️"
    } else {
        "❌"
    }
}

pub fn render_status(c: &Classification, missing: &[String], window_secs: u64) -> String {
    let mut out = format!(
        "📊 *CURRENT STATUS*\n{RULE}\n\
         🔍 *Analysis:* {kind}\n\
         🎯 *Confidence:* {confidence:.0}%\n\
         📝 *Details:* {reason}\n\
         ⏰ *Analysis Window:* {minutes} minutes",
        kind = escape_markdown(c.outage_type.as_str()),
        confidence = c.confidence * 100.0,
        reason = escape_markdown(&c.reason),
        minutes = window_secs / 60,
    );
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(|m| escape_markdown(m)).collect();
        let _ = write!(out, "\n❔ *No recent data:* {}", names.join(", "));
    }
    let _ = write!(out, "\n{}", RULE);
    out
}

pub fn render_daily(r: &DailyReport) -> String {
    let mut out = format!(
        "📊 *24-HOUR REPORT*\n{RULE}\n\
         📅 *Period:* {since} - Now\n\n\
         📈 *Statistics:*\n\
         • Total Events: {total}\n\
         • Down Events: {down}\n\
         • Uptime: {uptime:.1}%\n\
         • Avg Response: {avg:.1}ms\n\n\
         🔍 *Outage Analysis:*\n",
        since = r.since.format("%Y-%m-%d %H:%M"),
        total = r.events.total,
        down = r.events.down,
        uptime = r.uptime_percent,
        avg = r.events.avg_response_ms.unwrap_or(0.0),
    );
    if r.outages.is_empty() {
        out.push_str("• No outages\n");
    }
    for o in &r.outages {
        let _ = writeln!(
            out,
            "• {}: {} incidents (confidence: {:.0}%)",
            escape_markdown(o.outage_type.as_str()),
            o.count,
            o.avg_confidence * 100.0
        );
    }
    out.push_str(RULE);
    out
}

pub fn render_uptime(r: &UptimeReport) -> String {
    let mut out = format!("⏱️ *7-DAY UPTIME*\n{RULE}\n");
    if r.probes.is_empty() {
        out.push_str("No checks recorded.\n");
    }
    for p in &r.probes {
        let pct = p.uptime_percent();
        let _ = writeln!(out, "{} *{}:* {:.2}%", uptime_icon(pct), escape_markdown(&p.probe_id), pct);
    }
    out.push_str(RULE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::OutageType;
    use crate::probes::Event;
    use crate::storage::open_pool;

    #[test]
    fn test_uptime_icons() {
        assert_eq!(uptime_icon(100.0), "✅");
        assert_eq!(uptime_icon(97.0), "⚠️");
        assert_eq!(uptime_icon(95.0), "❌");
    }

    #[test]
    fn test_daily_report_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(dir.path().join("r.db").to_str().unwrap()).unwrap();
        let store = EventStore::new(pool.clone());
        let outages = OutageLog::new(pool);
        let now = Utc::now();

        store.append(&Event::up("Google DNS", 10.0, now - Duration::hours(2))).unwrap();
        store.append(&Event::down("Google DNS", now - Duration::hours(1))).unwrap();
        store.append(&Event::down("Google DNS", now - Duration::days(3))).unwrap();
        outages
            .record(&Classification {
                outage_type: OutageType::IspOutage,
                confidence: 0.9,
                affected: ["Google DNS".to_string()].into(),
                reason: String::new(),
                evaluated_at: now - Duration::hours(1),
            })
            .unwrap();

        let daily = daily_report(&store, &outages, now).unwrap();
        assert_eq!(daily.events.total, 2);
        assert_eq!(daily.events.down, 1);
        assert_eq!(daily.uptime_percent, 50.0);
        assert_eq!(daily.outages.len(), 1);
        let text = render_daily(&daily);
        assert!(text.contains("ISP\\_OUTAGE: 1 incidents (confidence: 90%)"));

        let weekly = uptime_report(&store, now).unwrap();
        assert_eq!(weekly.probes[0].checks, 3);
        assert!(render_uptime(&weekly).contains("❌ *Google DNS:* 33.33%"));
    }

    #[test]
    fn test_render_status_lists_missing() {
        let c = Classification {
            outage_type: OutageType::None,
            confidence: 1.0,
            affected: Default::default(),
            reason: "All services operational".to_string(),
            evaluated_at: Utc::now(),
        };
        let text = render_status(&c, &["Quad9".to_string(), "home_nas".to_string()], 300);
        assert!(text.contains("NONE"));
        assert!(text.contains("100%"));
        assert!(text.contains("5 minutes"));
        assert!(text.contains("Quad9, home\\_nas"));
    }
}
