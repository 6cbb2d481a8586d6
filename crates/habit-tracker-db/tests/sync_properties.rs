//! Property tests for reconcile idempotence and prune safety.

use std::collections::BTreeSet;

use habit_tracker_core::{IdNormalizer, parse_snapshot};
use habit_tracker_db::{MemoryBackend, SyncPlan, prune, reconcile};
use proptest::prelude::*;
use serde_json::json;

/// Profiles with distinct ids, each with a few children whose ids are unique
/// across the whole snapshot.
fn snapshot_strategy() -> impl Strategy<Value = String> {
    prop::collection::btree_set(1_i64..500, 0..8).prop_flat_map(|ids| {
        let ids: Vec<i64> = ids.into_iter().collect();
        let n = ids.len();
        (Just(ids), prop::collection::vec((0_usize..3, 0_usize..3), n))
    })
    .prop_map(|(ids, child_counts)| {
        let mut next_child = 10_000_i64;
        let profiles: Vec<_> = ids
            .iter()
            .zip(child_counts)
            .map(|(id, (habits, history))| {
                let habits: Vec<_> = (0..habits)
                    .map(|_| {
                        next_child += 1;
                        json!({"id": next_child, "nombre": "h", "hora": "07:00"})
                    })
                    .collect();
                let history: Vec<_> = (0..history)
                    .map(|_| {
                        next_child += 1;
                        json!({"id": next_child, "nombre": "h", "hora": "07:00", "estado": "completado"})
                    })
                    .collect();
                json!({"id": id, "nombre": format!("p{id}"), "habitos_programados": habits, "historial_habitos": history})
            })
            .collect();
        serde_json::Value::Array(profiles).to_string()
    })
}

fn plan(json: &str) -> SyncPlan {
    SyncPlan::build(&parse_snapshot(json).unwrap(), &IdNormalizer::new())
}

proptest! {
    #[test]
    fn reconcile_is_idempotent(snapshot in snapshot_strategy()) {
        let plan = plan(&snapshot);
        let mut backend = MemoryBackend::new();
        reconcile(&mut backend, &plan).unwrap();
        let once = backend.state().clone();
        reconcile(&mut backend, &plan).unwrap();
        prop_assert_eq!(backend.state(), &once);
    }

    #[test]
    fn prune_leaves_exactly_snapshot_ids(first in snapshot_strategy(), second in snapshot_strategy()) {
        let mut backend = MemoryBackend::new();
        reconcile(&mut backend, &plan(&first)).unwrap();

        let second = plan(&second);
        reconcile(&mut backend, &second).unwrap();
        prune(&mut backend, &second).unwrap();

        let state = backend.state();
        let stored: BTreeSet<i64> = state.profiles.keys().copied().collect();
        prop_assert_eq!(stored, second.profile_ids());
        for habit in state.scheduled_habits.values() {
            prop_assert!(state.profiles.contains_key(&habit.profile_id));
        }
        for entry in state.history.values() {
            prop_assert!(state.profiles.contains_key(&entry.profile_id));
        }
    }
}
