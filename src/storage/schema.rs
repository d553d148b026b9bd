//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            probe_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('up', 'down')),
            response_time REAL,
            timestamp TEXT NOT NULL,
            message TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS outage_analysis (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            outage_type TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            duration_secs INTEGER,
            affected_monitors TEXT NOT NULL,
            confidence_score REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
        CREATE INDEX IF NOT EXISTS idx_events_probe ON events(probe_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_outage_start ON outage_analysis(start_time);",
    )?;

    // Migration: classification verdict recorded against each event
    let has_analysis: i32 = conn
        .query_row(
            "SELECT count(*) FROM pragma_table_info('events') WHERE name='analysis_type'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if has_analysis == 0 {
        conn.execute("ALTER TABLE events ADD COLUMN analysis_type TEXT", [])?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (1)",
        [],
    )?;

    Ok(())
}
