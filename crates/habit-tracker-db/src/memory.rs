//! In-memory backend.
//!
//! Mirrors the relational semantics the reconciler relies on (upsert by id,
//! foreign keys, cascading deletes, all-or-nothing commit) without a database.
//! A [`FailPoint`] makes one step fail so rollback paths can be exercised.

use std::collections::{BTreeMap, BTreeSet};

use crate::backend::{SyncBackend, SyncTransaction};
use crate::error::{DbError, DbResult};
use crate::plan::{HistoryRow, ProfileRow, ScheduledHabitRow};

/// Tables held by a [`MemoryBackend`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    pub profiles: BTreeMap<i64, ProfileRow>,
    pub scheduled_habits: BTreeMap<i64, ScheduledHabitRow>,
    pub history: BTreeMap<i64, HistoryRow>,
}

impl MemoryState {
    /// Scheduled habits owned by `profile_id`, ordered by id.
    #[must_use]
    pub fn habits_of(&self, profile_id: i64) -> Vec<&ScheduledHabitRow> {
        self.scheduled_habits
            .values()
            .filter(|h| h.profile_id == profile_id)
            .collect()
    }

    /// History rows owned by `profile_id`, ordered by id.
    #[must_use]
    pub fn history_of(&self, profile_id: i64) -> Vec<&HistoryRow> {
        self.history
            .values()
            .filter(|h| h.profile_id == profile_id)
            .collect()
    }

    fn require_parent(&self, profile_id: i64, table: &str, id: i64) -> DbResult<()> {
        if self.profiles.contains_key(&profile_id) {
            Ok(())
        } else {
            Err(DbError::Sqlite(format!(
                "FOREIGN KEY constraint failed: {table} {id} references missing profile {profile_id}"
            )))
        }
    }
}

/// Step at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    UpsertProfiles,
    DeleteChildren(i64),
    UpsertScheduledHabits(i64),
    UpsertHistory(i64),
    SelectProfileIds,
    DeleteProfiles,
    Commit,
}

/// Backend that keeps its tables in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: MemoryState,
    fail_at: Option<FailPoint>,
    commits: usize,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later transaction fail at `point`.
    pub fn fail_at(&mut self, point: Option<FailPoint>) {
        self.fail_at = point;
    }

    #[must_use]
    pub const fn state(&self) -> &MemoryState {
        &self.state
    }

    /// Number of transactions committed so far.
    #[must_use]
    pub const fn commits(&self) -> usize {
        self.commits
    }
}

impl SyncBackend for MemoryBackend {
    type Tx<'a> = MemoryTransaction<'a>;

    fn begin(&mut self) -> DbResult<Self::Tx<'_>> {
        let working = self.state.clone();
        Ok(MemoryTransaction {
            working,
            backend: self,
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Transaction over a private copy of the tables; commit swaps it in.
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    backend: &'a mut MemoryBackend,
    working: MemoryState,
}

impl MemoryTransaction<'_> {
    fn check(&self, point: FailPoint) -> DbResult<()> {
        if self.backend.fail_at == Some(point) {
            Err(DbError::Sqlite(format!("injected failure at {point:?}")))
        } else {
            Ok(())
        }
    }
}

impl SyncTransaction for MemoryTransaction<'_> {
    fn upsert_profiles(&mut self, rows: &[ProfileRow]) -> DbResult<usize> {
        self.check(FailPoint::UpsertProfiles)?;
        for row in rows {
            let mut row = row.clone();
            if row.created_at.is_none() {
                row.created_at = self
                    .working
                    .profiles
                    .get(&row.id)
                    .and_then(|existing| existing.created_at);
            }
            self.working.profiles.insert(row.id, row);
        }
        Ok(rows.len())
    }

    fn delete_children(&mut self, profile_id: i64) -> DbResult<usize> {
        self.check(FailPoint::DeleteChildren(profile_id))?;
        let before = self.working.scheduled_habits.len() + self.working.history.len();
        self.working
            .scheduled_habits
            .retain(|_, h| h.profile_id != profile_id);
        self.working.history.retain(|_, h| h.profile_id != profile_id);
        Ok(before - self.working.scheduled_habits.len() - self.working.history.len())
    }

    fn upsert_scheduled_habits(&mut self, rows: &[ScheduledHabitRow]) -> DbResult<usize> {
        for row in rows {
            self.check(FailPoint::UpsertScheduledHabits(row.profile_id))?;
            self.working
                .require_parent(row.profile_id, "scheduled_habits", row.id)?;
            self.working.scheduled_habits.insert(row.id, row.clone());
        }
        Ok(rows.len())
    }

    fn upsert_history(&mut self, rows: &[HistoryRow]) -> DbResult<usize> {
        for row in rows {
            self.check(FailPoint::UpsertHistory(row.profile_id))?;
            self.working.require_parent(row.profile_id, "history", row.id)?;
            let mut row = row.clone();
            if row.completed_at.is_none() {
                row.completed_at = self
                    .working
                    .history
                    .get(&row.id)
                    .and_then(|existing| existing.completed_at);
            }
            self.working.history.insert(row.id, row);
        }
        Ok(rows.len())
    }

    fn select_profile_ids(&mut self) -> DbResult<BTreeSet<i64>> {
        self.check(FailPoint::SelectProfileIds)?;
        Ok(self.working.profiles.keys().copied().collect())
    }

    fn delete_profiles(&mut self, ids: &[i64]) -> DbResult<usize> {
        self.check(FailPoint::DeleteProfiles)?;
        let mut deleted = 0;
        for id in ids {
            if self.working.profiles.remove(id).is_some() {
                deleted += 1;
                self.working.scheduled_habits.retain(|_, h| h.profile_id != *id);
                self.working.history.retain(|_, h| h.profile_id != *id);
            }
        }
        Ok(deleted)
    }

    fn commit(self) -> DbResult<()> {
        self.check(FailPoint::Commit)?;
        self.backend.state = self.working;
        self.backend.commits += 1;
        Ok(())
    }
}
