//! Snapshot file loading.
//!
//! The loader never substitutes an empty list for a missing or malformed file;
//! that policy belongs to the caller.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use crate::error::{SnapshotError, SnapshotResult};
use crate::models::ProfileRecord;

/// Read and decode the snapshot at `path`.
pub fn load_snapshot(path: &Path) -> SnapshotResult<Vec<ProfileRecord>> {
    let contents = fs::read_to_string(path).map_err(|e| SnapshotError::from_io(path, e))?;
    let profiles = parse_snapshot_at(path, &contents)?;
    tracing::debug!(path = %path.display(), profiles = profiles.len(), "snapshot loaded");
    Ok(profiles)
}

/// Decode snapshot text that did not come from a file.
pub fn parse_snapshot(contents: &str) -> SnapshotResult<Vec<ProfileRecord>> {
    parse_snapshot_at(Path::new("<memory>"), contents)
}

fn parse_snapshot_at(path: &Path, contents: &str) -> SnapshotResult<Vec<ProfileRecord>> {
    serde_json::from_str(contents).map_err(|e| SnapshotError::from_json(path, &e))
}

/// Modification time of the snapshot, used for staleness detection.
pub fn snapshot_mtime(path: &Path) -> SnapshotResult<SystemTime> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| SnapshotError::from_io(path, e))
}
