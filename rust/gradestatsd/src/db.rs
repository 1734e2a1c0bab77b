use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::session::Session;

pub const DB_FILE: &str = "gradestats.sqlite3";
pub const SESSIONS_KEY: &str = "calculatorSessions";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    // Older workspaces may predate the timestamp column.
    if !table_has_column(conn, "kv", "updated_at")? {
        conn.execute("ALTER TABLE kv ADD COLUMN updated_at TEXT", [])?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn kv_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    Ok(value)
}

pub fn kv_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO kv(key, value, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (key, value, chrono::Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

pub fn kv_remove(conn: &Connection, key: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
    Ok(n > 0)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let Some(raw) = kv_get(conn, key)? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("stored value for {} is not valid JSON", key))?;
    Ok(Some(value))
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    kv_set(conn, key, &serde_json::to_string(value)?)
}

/// Stored session list, in storage order (newest first). A missing key is
/// an empty history.
pub fn sessions_load(conn: &Connection) -> anyhow::Result<Vec<Session>> {
    let Some(raw) = kv_get(conn, SESSIONS_KEY)? else {
        return Ok(Vec::new());
    };
    let sessions: Vec<Session> =
        serde_json::from_str(&raw).context("stored sessions are not a valid session array")?;
    Ok(sessions)
}

pub fn sessions_store(conn: &Connection, sessions: &[Session]) -> anyhow::Result<()> {
    kv_set(conn, SESSIONS_KEY, &serde_json::to_string(sessions)?)
}

/// Returns how many sessions were dropped.
pub fn sessions_clear(conn: &Connection) -> anyhow::Result<usize> {
    let count = match sessions_load(conn) {
        Ok(existing) => existing.len(),
        Err(_) => 0,
    };
    kv_remove(conn, SESSIONS_KEY)?;
    Ok(count)
}
