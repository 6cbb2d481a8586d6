//! Relational side of the habit tracker sync.
//!
//! A snapshot is first turned into a [`SyncPlan`] (every id normalized once),
//! then written by [`reconcile`] and optionally trimmed by [`prune`]. Both work
//! against the [`SyncBackend`] capability, implemented here for `SQLite`
//! ([`SqliteBackend`]) and for process memory ([`MemoryBackend`]).

#![forbid(unsafe_code)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod plan;
pub mod prune;
pub mod reconcile;
pub mod schema;
pub mod sqlite;

pub use backend::{SyncBackend, SyncTransaction};
pub use error::{DbError, DbResult};
pub use memory::{FailPoint, MemoryBackend, MemoryState};
pub use plan::{HistoryRow, ProfilePlan, ProfileRow, ScheduledHabitRow, SyncPlan};
pub use prune::prune;
pub use reconcile::{ReconcileReport, reconcile};
pub use sqlite::{SqliteBackend, SqliteTransaction};
