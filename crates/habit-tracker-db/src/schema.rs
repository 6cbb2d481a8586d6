//! Relational schema.
//!
//! The sync job assumes these tables already exist. [`create_tables`] is only
//! run on explicit request (`--init-schema`) and by tests; there is no
//! migration machinery.

use rusqlite::Connection;

use crate::error::{DbError, DbResult};

/// Tables the reconciler writes to.
pub const REQUIRED_TABLES: &[&str] = &["profiles", "scheduled_habits", "history"];

/// SQL statements for creating the database schema
pub const CREATE_TABLES_SQL: &str = r"
-- Profiles table
CREATE TABLE IF NOT EXISTS profiles (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    credential_hash TEXT NOT NULL DEFAULT '',
    created_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_profiles_email ON profiles(email);

-- Scheduled habits (owned by a profile)
CREATE TABLE IF NOT EXISTS scheduled_habits (
    id INTEGER PRIMARY KEY,
    profile_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    name TEXT NOT NULL DEFAULT '',
    time TEXT NOT NULL DEFAULT '',
    category TEXT,
    active INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_scheduled_habits_profile ON scheduled_habits(profile_id);

-- Habit history (owned by a profile)
CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY,
    profile_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    name TEXT NOT NULL DEFAULT '',
    time TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'not_completed'
        CHECK (status IN ('completed', 'not_completed')),
    completed_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_history_profile ON history(profile_id);
";

/// Connection settings applied to every session.
///
/// Foreign keys are off by default in `SQLite`; cascading prune depends on them.
pub const PRAGMA_SETTINGS_SQL: &str = r"
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
";

/// Create all tables and indexes if they do not exist.
pub fn create_tables(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(CREATE_TABLES_SQL)
        .map_err(|e| DbError::Schema(e.to_string()))
}

/// Required tables that are not present.
pub fn missing_tables(conn: &Connection) -> DbResult<Vec<&'static str>> {
    let mut stmt = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
        .map_err(|e| DbError::Schema(e.to_string()))?;
    let mut missing = Vec::new();
    for table in REQUIRED_TABLES {
        let present = stmt
            .exists([*table])
            .map_err(|e| DbError::Schema(e.to_string()))?;
        if !present {
            missing.push(*table);
        }
    }
    Ok(missing)
}

/// Fail with [`DbError::Schema`] when any required table is missing.
pub fn verify_schema(conn: &Connection) -> DbResult<()> {
    let missing = missing_tables(conn)?;
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DbError::Schema(format!(
            "missing tables: {} (create them or pass --init-schema)",
            missing.join(", ")
        )))
    }
}
