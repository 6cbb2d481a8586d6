//! Reconciler: make the relational store match a snapshot.

use crate::backend::{SyncBackend, SyncTransaction};
use crate::error::DbResult;
use crate::plan::SyncPlan;

/// Rows written by one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub profiles: usize,
    pub scheduled_habits: usize,
    pub history_entries: usize,
}

/// Upsert every profile of `plan` and replace each profile's children, in a
/// single transaction.
///
/// Nothing is committed unless every step succeeds; the returned error names
/// the failing step and, for child writes, the profile.
pub fn reconcile<B: SyncBackend>(backend: &mut B, plan: &SyncPlan) -> DbResult<ReconcileReport> {
    let mut tx = backend
        .begin()
        .map_err(|e| e.in_operation("begin reconcile", None))?;
    let mut report = ReconcileReport::default();

    report.profiles = tx
        .upsert_profiles(&plan.profile_rows())
        .map_err(|e| e.in_operation("upsert profiles", None))?;
    tracing::debug!(profiles = report.profiles, "profiles upserted");

    for profile in plan.profiles() {
        let id = profile.profile.id;
        tx.delete_children(id)
            .map_err(|e| e.in_operation("delete children", Some(id)))?;
        report.scheduled_habits += tx
            .upsert_scheduled_habits(&profile.scheduled_habits)
            .map_err(|e| e.in_operation("upsert scheduled habits", Some(id)))?;
        report.history_entries += tx
            .upsert_history(&profile.history)
            .map_err(|e| e.in_operation("upsert history", Some(id)))?;
    }

    tx.commit()
        .map_err(|e| e.in_operation("commit reconcile", None))?;

    for (email, ids) in plan.shared_emails() {
        tracing::warn!(email = %email, profile_ids = ?ids, "email shared by several profiles");
    }
    tracing::info!(
        profiles = report.profiles,
        scheduled_habits = report.scheduled_habits,
        history_entries = report.history_entries,
        generated_ids = plan.generated_ids(),
        "snapshot reconciled"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailPoint, MemoryBackend};
    use habit_tracker_core::{IdNormalizer, parse_snapshot};

    const SNAPSHOT: &str = r#"[
        {"id": 1, "nombre": "Ana", "habitos_programados": [{"id": 10, "nombre": "Run", "hora": "07:00"}]},
        {"id": 2, "nombre": "Luis", "historial_habitos": [{"id": 20, "nombre": "Read", "hora": "21:00", "estado": "completado"}]}
    ]"#;

    fn plan() -> SyncPlan {
        SyncPlan::build(&parse_snapshot(SNAPSHOT).unwrap(), &IdNormalizer::with_clock(|| 500_i64))
    }

    #[test]
    fn counts_written_rows() {
        let mut backend = MemoryBackend::new();
        let report = reconcile(&mut backend, &plan()).unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                profiles: 2,
                scheduled_habits: 1,
                history_entries: 1,
            }
        );
        assert_eq!(backend.commits(), 1);
    }

    #[test]
    fn failure_names_profile_and_rolls_back() {
        let mut backend = MemoryBackend::new();
        backend.fail_at(Some(FailPoint::UpsertHistory(2)));
        let err = reconcile(&mut backend, &plan()).unwrap_err();
        assert!(err.to_string().starts_with("upsert history failed for profile 2"));
        assert!(backend.state().profiles.is_empty());
        assert!(backend.state().scheduled_habits.is_empty());
        assert_eq!(backend.commits(), 0);
    }

    #[test]
    fn commit_failure_leaves_previous_state() {
        let mut backend = MemoryBackend::new();
        reconcile(&mut backend, &plan()).unwrap();
        let before = backend.state().clone();

        let changed = SyncPlan::build(
            &parse_snapshot(r#"[{"id": 1, "nombre": "Ana B"}]"#).unwrap(),
            &IdNormalizer::new(),
        );
        backend.fail_at(Some(FailPoint::Commit));
        let err = reconcile(&mut backend, &changed).unwrap_err();
        assert!(err.to_string().starts_with("commit reconcile failed"));
        assert_eq!(backend.state(), &before);
    }
}
