//! Pruner: delete profiles that are no longer in the snapshot.

use crate::backend::{SyncBackend, SyncTransaction};
use crate::error::DbResult;
use crate::plan::SyncPlan;

/// Delete every stored profile whose id is not in `plan`, in its own
/// transaction. Children go with their profile by cascade.
///
/// Returns the deleted ids in ascending order. When nothing needs deleting the
/// transaction is dropped without committing.
pub fn prune<B: SyncBackend>(backend: &mut B, plan: &SyncPlan) -> DbResult<Vec<i64>> {
    let keep = plan.profile_ids();
    let mut tx = backend
        .begin()
        .map_err(|e| e.in_operation("begin prune", None))?;
    let existing = tx
        .select_profile_ids()
        .map_err(|e| e.in_operation("select profile ids", None))?;

    let stale: Vec<i64> = existing.difference(&keep).copied().collect();
    if stale.is_empty() {
        tracing::debug!("nothing to prune");
        return Ok(stale);
    }

    tx.delete_profiles(&stale)
        .map_err(|e| e.in_operation("delete profiles", None))?;
    tx.commit()
        .map_err(|e| e.in_operation("commit prune", None))?;
    tracing::info!(count = stale.len(), ids = ?stale, "pruned profiles absent from snapshot");
    Ok(stale)
}
