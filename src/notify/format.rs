//! Markdown rendering for chat notifications.

use super::Recovery;
use crate::detect::{Classification, OutageType};
use std::fmt::Write;

pub const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";
const MAX_LISTED: usize = 5;

fn headline(t: OutageType) -> (&'static str, &'static str) {
    match t {
        OutageType::PowerOutage => ("🔌", "POWER OUTAGE DETECTED"),
        OutageType::IspOutage => ("🌐", "ISP OUTAGE DETECTED"),
        OutageType::RouterFailure => ("📡", "ROUTER FAILURE"),
        OutageType::PartialOutage => ("⚠️", "PARTIAL OUTAGE"),
        OutageType::None => ("ℹ️", "SERVICE UPDATE"),
    }
}

pub fn recommendation(t: OutageType) -> &'static str {
    match t {
        OutageType::PowerOutage => {
            "Check main power supply and circuit breakers. UPS recommended for critical infrastructure."
        }
        OutageType::IspOutage => {
            "Contact ISP for service status. Consider backup internet connection."
        }
        OutageType::RouterFailure => "Restart router. Check cable connections and router logs.",
        OutageType::PartialOutage => {
            "Monitor affected services. May be temporary or service-specific issue."
        }
        OutageType::None => "All systems operational. No action required.",
    }
}

/// Backslash-escape the characters the Bot API's Markdown mode treats as
/// entity delimiters. Every dynamic field goes through this.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Bullet list of affected probes, truncated after a handful.
pub fn affected_list<'a>(affected: impl ExactSizeIterator<Item = &'a String>) -> String {
    let total = affected.len();
    if total == 0 {
        return "• None".to_string();
    }
    let mut out = affected
        .take(MAX_LISTED)
        .map(|s| format!("• {}", escape_markdown(s)))
        .collect::<Vec<_>>()
        .join("\n");
    if total > MAX_LISTED {
        let _ = write!(out, "\n• ... and {} more", total - MAX_LISTED);
    }
    out
}

/// `1h 2m 3s`, dropping leading zero units; `0s` for an empty duration.
pub fn human_duration(d: chrono::Duration) -> String {
    let total = d.num_seconds().max(0);
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m {}s", m, s),
        _ => format!("{}h {}m {}s", h, m, s),
    }
}

pub fn render_alert(c: &Classification) -> String {
    let (icon, title) = headline(c.outage_type);
    format!(
        "{icon} *{title}*\n{RULE}\n\
         📊 *Severity:* {severity}\n\
         🎯 *Confidence:* {confidence:.0}%\n\
         ⏰ *Time:* {time}\n\n\
         📝 *Analysis:*\n{reason}\n\n\
         🔍 *Affected Services:*\n{affected}\n\n\
         💡 *Recommendation:*\n{recommendation}\n{RULE}",
        severity = c.severity(),
        confidence = c.confidence * 100.0,
        time = c.evaluated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        reason = escape_markdown(&c.reason),
        affected = affected_list(c.affected.iter()),
        recommendation = recommendation(c.outage_type),
    )
}

pub fn render_recovery(r: &Recovery) -> String {
    let mut out = format!(
        "✅ *RECOVERED: {probe}*\n{RULE}\n\
         ⏱️ *Downtime:* {duration}\n\
         🔻 *Down since:* {since}\n\
         🔺 *Recovered at:* {at}",
        probe = escape_markdown(&r.probe_id),
        duration = human_duration(r.duration),
        since = r.down_since.format("%Y-%m-%d %H:%M:%S UTC"),
        at = r.recovered_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );
    if let Some(rt) = r.response_time {
        let _ = write!(out, "\n📶 *Response time:* {:.1}ms", rt);
    }
    let _ = write!(out, "\n{}", RULE);
    out
}
