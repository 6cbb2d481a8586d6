//! Core types for the habit tracker
//!
//! This crate provides:
//! - The snapshot data model (profiles, scheduled habits, history entries)
//! - Canonical id normalization
//! - ISO-8601 timestamp parsing and microsecond conversion
//! - Snapshot file loading
//! - Environment-backed configuration
//!
//! # Timestamp Convention
//!
//! Timestamps are carried as ISO-8601 text in the snapshot and stored as `i64`
//! microseconds since the Unix epoch (naive UTC) in the relational layer.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod snapshot;
pub mod timestamps;

pub use config::{Config, DbConfig};
pub use error::{SnapshotError, SnapshotResult};
pub use ids::{IdClock, IdNormalizer, IdSource, SystemClock, parse_canonical_id};
pub use models::{HabitStatus, HistoryRecord, ProfileRecord, ScheduledHabitRecord};
pub use snapshot::{load_snapshot, parse_snapshot, snapshot_mtime};
pub use timestamps::{
    iso_to_micros, micros_to_naive, naive_to_micros, now_iso, parse_iso_timestamp,
};
