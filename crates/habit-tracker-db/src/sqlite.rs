//! `SQLite` adapter for the sync backend traits.

use std::collections::BTreeSet;
use std::path::Path;

use habit_tracker_core::{DbConfig, HabitStatus};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::backend::{SyncBackend, SyncTransaction};
use crate::error::{DbError, DbResult};
use crate::plan::{HistoryRow, ProfileRow, ScheduledHabitRow};
use crate::schema;

const UPSERT_PROFILE_SQL: &str = "\
INSERT INTO profiles (id, name, email, credential_hash, created_at)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(id) DO UPDATE SET
    name = excluded.name,
    email = excluded.email,
    credential_hash = excluded.credential_hash,
    created_at = COALESCE(excluded.created_at, profiles.created_at)";

const UPSERT_SCHEDULED_HABIT_SQL: &str = "\
INSERT INTO scheduled_habits (id, profile_id, name, time, category, active)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(id) DO UPDATE SET
    profile_id = excluded.profile_id,
    name = excluded.name,
    time = excluded.time,
    category = excluded.category,
    active = excluded.active";

const UPSERT_HISTORY_SQL: &str = "\
INSERT INTO history (id, profile_id, name, time, status, completed_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(id) DO UPDATE SET
    profile_id = excluded.profile_id,
    name = excluded.name,
    time = excluded.time,
    status = excluded.status,
    completed_at = COALESCE(excluded.completed_at, history.completed_at)";

/// A single `SQLite` connection owned by the sync process.
pub struct SqliteBackend {
    conn: Connection,
    label: String,
}

impl SqliteBackend {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::Connection(format!("{}: {e}", path.display())))?;
        Self::configure(conn, format!("sqlite:{}", path.display()))
    }

    /// Open the database described by `config` (`DB_NAME` is the file path).
    pub fn connect(config: &DbConfig) -> DbResult<Self> {
        let path = config.sqlite_path();
        tracing::debug!(database = %config.describe(), path = %path.display(), "opening database");
        Self::open(&path)
    }

    /// Private in-memory database, mainly for tests.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DbError::Connection(e.to_string()))?;
        Self::configure(conn, "sqlite::memory:".to_string())
    }

    fn configure(conn: Connection, label: String) -> DbResult<Self> {
        conn.execute_batch(schema::PRAGMA_SETTINGS_SQL)
            .map_err(|e| DbError::Connection(format!("{label}: {e}")))?;
        Ok(Self { conn, label })
    }

    /// Create the tables if they do not exist.
    pub fn ensure_schema(&self) -> DbResult<()> {
        schema::create_tables(&self.conn)
    }

    /// Fail when any table the reconciler needs is missing.
    pub fn verify_schema(&self) -> DbResult<()> {
        schema::verify_schema(&self.conn)
    }

    /// Close the connection, reporting any error from `SQLite`.
    pub fn close(self) -> DbResult<()> {
        self.conn.close().map_err(|(_, e)| DbError::from(e))
    }

    /// All profile rows, ordered by id.
    pub fn profile_rows(&self) -> DbResult<Vec<ProfileRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, credential_hash, created_at FROM profiles ORDER BY id",
        )?;
        let rows = stmt.query_map([], map_profile)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// One profile row, if present.
    pub fn profile_row(&self, id: i64) -> DbResult<Option<ProfileRow>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, email, credential_hash, created_at FROM profiles WHERE id = ?1",
                [id],
                map_profile,
            )
            .optional()?)
    }

    /// All scheduled habit rows, ordered by id.
    pub fn scheduled_habit_rows(&self) -> DbResult<Vec<ScheduledHabitRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, profile_id, name, time, category, active FROM scheduled_habits ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ScheduledHabitRow {
                id: row.get(0)?,
                profile_id: row.get(1)?,
                name: row.get(2)?,
                time: row.get(3)?,
                category: row.get(4)?,
                active: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// All history rows, ordered by id.
    pub fn history_rows(&self) -> DbResult<Vec<HistoryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, profile_id, name, time, status, completed_at FROM history ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(4)?;
            Ok(HistoryRow {
                id: row.get(0)?,
                profile_id: row.get(1)?,
                name: row.get(2)?,
                time: row.get(3)?,
                status: HabitStatus::parse(&status).unwrap_or_default(),
                completed_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

fn map_profile(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        credential_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl SyncBackend for SqliteBackend {
    type Tx<'a> = SqliteTransaction<'a>;

    fn begin(&mut self) -> DbResult<Self::Tx<'_>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTransaction { tx })
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// An open `SQLite` transaction. Rolls back on drop.
pub struct SqliteTransaction<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl SyncTransaction for SqliteTransaction<'_> {
    fn upsert_profiles(&mut self, rows: &[ProfileRow]) -> DbResult<usize> {
        let mut stmt = self.tx.prepare_cached(UPSERT_PROFILE_SQL)?;
        for row in rows {
            stmt.execute(params![
                row.id,
                row.name,
                row.email,
                row.credential_hash,
                row.created_at
            ])?;
        }
        Ok(rows.len())
    }

    fn delete_children(&mut self, profile_id: i64) -> DbResult<usize> {
        let habits = self
            .tx
            .execute("DELETE FROM scheduled_habits WHERE profile_id = ?1", [profile_id])?;
        let history = self
            .tx
            .execute("DELETE FROM history WHERE profile_id = ?1", [profile_id])?;
        Ok(habits + history)
    }

    fn upsert_scheduled_habits(&mut self, rows: &[ScheduledHabitRow]) -> DbResult<usize> {
        let mut stmt = self.tx.prepare_cached(UPSERT_SCHEDULED_HABIT_SQL)?;
        for row in rows {
            stmt.execute(params![
                row.id,
                row.profile_id,
                row.name,
                row.time,
                row.category,
                row.active
            ])?;
        }
        Ok(rows.len())
    }

    fn upsert_history(&mut self, rows: &[HistoryRow]) -> DbResult<usize> {
        let mut stmt = self.tx.prepare_cached(UPSERT_HISTORY_SQL)?;
        for row in rows {
            stmt.execute(params![
                row.id,
                row.profile_id,
                row.name,
                row.time,
                row.status.as_str(),
                row.completed_at
            ])?;
        }
        Ok(rows.len())
    }

    fn select_profile_ids(&mut self) -> DbResult<BTreeSet<i64>> {
        let mut stmt = self.tx.prepare_cached("SELECT id FROM profiles")?;
        let ids = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        Ok(ids.collect::<Result<_, _>>()?)
    }

    fn delete_profiles(&mut self, ids: &[i64]) -> DbResult<usize> {
        let mut stmt = self.tx.prepare_cached("DELETE FROM profiles WHERE id = ?1")?;
        let mut deleted = 0;
        for id in ids {
            deleted += stmt.execute([id])?;
        }
        Ok(deleted)
    }

    fn commit(self) -> DbResult<()> {
        self.tx.commit()?;
        Ok(())
    }
}
