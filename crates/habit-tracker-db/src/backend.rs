//! Storage-backend capability interface.
//!
//! The reconciler and pruner are written once against these traits. Each
//! relational backend supplies a thin adapter: open a transaction, then upsert
//! rows, delete children by parent, select existing ids and delete profiles
//! inside it. Dropping a transaction without calling
//! [`SyncTransaction::commit`] rolls it back.

use std::collections::BTreeSet;

use crate::error::DbResult;
use crate::plan::{HistoryRow, ProfileRow, ScheduledHabitRow};

/// A store the sync engine can write snapshots into.
pub trait SyncBackend {
    type Tx<'a>: SyncTransaction
    where
        Self: 'a;

    /// Start a transaction. The backend stays mutably borrowed until it ends.
    fn begin(&mut self) -> DbResult<Self::Tx<'_>>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Operations available inside one transaction.
pub trait SyncTransaction {
    /// Insert-or-update profiles keyed by id. A `None` creation timestamp keeps
    /// the stored value.
    fn upsert_profiles(&mut self, rows: &[ProfileRow]) -> DbResult<usize>;

    /// Delete every scheduled habit and history row owned by `profile_id`.
    fn delete_children(&mut self, profile_id: i64) -> DbResult<usize>;

    /// Insert-or-update scheduled habits; conflicts overwrite every column.
    fn upsert_scheduled_habits(&mut self, rows: &[ScheduledHabitRow]) -> DbResult<usize>;

    /// Insert-or-update history rows; a `None` completion timestamp keeps the
    /// stored value.
    fn upsert_history(&mut self, rows: &[HistoryRow]) -> DbResult<usize>;

    /// Ids of every stored profile.
    fn select_profile_ids(&mut self) -> DbResult<BTreeSet<i64>>;

    /// Delete profiles (children go by cascade).
    fn delete_profiles(&mut self, ids: &[i64]) -> DbResult<usize>;

    /// Make the transaction's writes durable.
    fn commit(self) -> DbResult<()>
    where
        Self: Sized;
}
