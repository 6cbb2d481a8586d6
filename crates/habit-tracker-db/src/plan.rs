//! Normalized rows for one reconciliation pass.
//!
//! Every raw id in the snapshot is normalized exactly once, here. The reconciler
//! and the pruner both read the same [`SyncPlan`], so a profile whose id had to
//! be generated uses that same id for its children and for prune membership.

use std::collections::{BTreeMap, BTreeSet};

use habit_tracker_core::{
    HabitStatus, HistoryRecord, IdClock, IdNormalizer, IdSource, ProfileRecord,
    ScheduledHabitRecord, iso_to_micros,
};
use serde_json::Value;

/// Row for the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub credential_hash: String,
    /// Microseconds since epoch; `None` never overwrites a stored value.
    pub created_at: Option<i64>,
}

/// Row for the `scheduled_habits` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledHabitRow {
    pub id: i64,
    pub profile_id: i64,
    pub name: String,
    pub time: String,
    pub category: Option<String>,
    pub active: bool,
}

/// Row for the `history` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub id: i64,
    pub profile_id: i64,
    pub name: String,
    pub time: String,
    pub status: HabitStatus,
    /// Microseconds since epoch; `None` never overwrites a stored value.
    pub completed_at: Option<i64>,
}

/// A profile and the complete set of children it should own after the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePlan {
    pub profile: ProfileRow,
    pub scheduled_habits: Vec<ScheduledHabitRow>,
    pub history: Vec<HistoryRow>,
}

/// Normalized content of one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    profiles: Vec<ProfilePlan>,
    generated_ids: usize,
}

impl SyncPlan {
    /// Normalize every profile and child id of `records`.
    pub fn build<C: IdClock>(records: &[ProfileRecord], ids: &IdNormalizer<C>) -> Self {
        let mut generated_ids = 0;
        let mut next_id = |raw: Option<&Value>| {
            let (id, source) = ids.normalize_with_source(raw);
            if source != IdSource::Supplied {
                generated_ids += 1;
            }
            id
        };

        let mut profiles = Vec::with_capacity(records.len());
        for record in records {
            let profile_id = next_id(record.id.as_ref());
            let mut scheduled_habits = Vec::with_capacity(record.scheduled_habits.len());
            for habit in &record.scheduled_habits {
                scheduled_habits.push(scheduled_habit_row(habit, next_id(habit.id.as_ref()), profile_id));
            }
            let mut history = Vec::with_capacity(record.history.len());
            for entry in &record.history {
                history.push(history_row(entry, next_id(entry.id.as_ref()), profile_id));
            }
            profiles.push(ProfilePlan {
                profile: profile_row(record, profile_id),
                scheduled_habits,
                history,
            });
        }

        Self {
            profiles,
            generated_ids,
        }
    }

    #[must_use]
    pub fn profiles(&self) -> &[ProfilePlan] {
        &self.profiles
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Number of ids (profiles and children) that had to be generated.
    #[must_use]
    pub const fn generated_ids(&self) -> usize {
        self.generated_ids
    }

    /// Rows for the `profiles` upsert, in snapshot order.
    #[must_use]
    pub fn profile_rows(&self) -> Vec<ProfileRow> {
        self.profiles.iter().map(|p| p.profile.clone()).collect()
    }

    /// Canonical profile ids present in the snapshot.
    #[must_use]
    pub fn profile_ids(&self) -> BTreeSet<i64> {
        self.profiles.iter().map(|p| p.profile.id).collect()
    }

    /// Non-empty emails used by more than one profile id.
    ///
    /// The relational schema does not enforce email uniqueness; the sync only
    /// reports these.
    #[must_use]
    pub fn shared_emails(&self) -> Vec<(String, Vec<i64>)> {
        let mut by_email: BTreeMap<&str, BTreeSet<i64>> = BTreeMap::new();
        for plan in &self.profiles {
            let email = plan.profile.email.trim();
            if !email.is_empty() {
                by_email.entry(email).or_default().insert(plan.profile.id);
            }
        }
        by_email
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(email, ids)| (email.to_string(), ids.into_iter().collect()))
            .collect()
    }
}

fn profile_row(record: &ProfileRecord, id: i64) -> ProfileRow {
    ProfileRow {
        id,
        name: record.name.clone().unwrap_or_default(),
        email: record.email.clone().unwrap_or_default(),
        credential_hash: record.credential.clone().unwrap_or_default(),
        created_at: iso_to_micros(record.created_at.as_deref()),
    }
}

fn scheduled_habit_row(habit: &ScheduledHabitRecord, id: i64, profile_id: i64) -> ScheduledHabitRow {
    ScheduledHabitRow {
        id,
        profile_id,
        name: habit.name.clone().unwrap_or_default(),
        time: habit.time.clone().unwrap_or_default(),
        category: habit.category.clone(),
        active: habit.is_active(),
    }
}

fn history_row(entry: &HistoryRecord, id: i64, profile_id: i64) -> HistoryRow {
    if let Some(raw) = entry.unrecognized_status() {
        tracing::warn!(profile_id, history_id = id, status = raw, "unknown habit status, using not_completed");
    }
    HistoryRow {
        id,
        profile_id,
        name: entry.name.clone().unwrap_or_default(),
        time: entry.time.clone().unwrap_or_default(),
        status: entry.status_or_default(),
        completed_at: iso_to_micros(entry.completed_at.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use habit_tracker_core::parse_snapshot;

    fn plan(json: &str) -> SyncPlan {
        let records = parse_snapshot(json).unwrap();
        SyncPlan::build(&records, &IdNormalizer::with_clock(|| 1_000_i64))
    }

    #[test]
    fn children_inherit_normalized_parent_id() {
        let plan = plan(
            r#"[{"id": "abc", "nombre": "Ana",
                 "habitos_programados": [{"id": "5", "nombre": "Run", "hora": "07:00"}],
                 "historial_habitos": [{"nombre": "Run", "hora": "07:00"}]}]"#,
        );
        let profile = &plan.profiles()[0];
        assert_eq!(profile.profile.id, 1_000);
        assert_eq!(profile.scheduled_habits[0].id, 5);
        assert_eq!(profile.scheduled_habits[0].profile_id, 1_000);
        assert_eq!(profile.history[0].id, 1_001);
        assert_eq!(profile.history[0].profile_id, 1_000);
        assert_eq!(profile.history[0].status, HabitStatus::NotCompleted);
        assert_eq!(plan.generated_ids(), 2);
        assert_eq!(plan.profile_ids(), BTreeSet::from([1_000]));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let plan = plan(r#"[{"id": 3, "fecha_creacion": "garbage", "habitos_programados": [{"id": 4}]}]"#);
        let profile = &plan.profiles()[0];
        assert_eq!(profile.profile.name, "");
        assert_eq!(profile.profile.created_at, None);
        assert!(profile.scheduled_habits[0].active);
        assert_eq!(profile.scheduled_habits[0].category, None);
    }

    #[test]
    fn hand_edited_values_fall_back_to_defaults() {
        let plan = plan(
            r#"[{"id": 7, "fecha_creacion": 1700000000,
                 "habitos_programados": [{"id": 8, "activo": "false"}, {"id": 9, "activo": "yes"}],
                 "historial_habitos": [{"id": 10, "estado": "pendiente"}, {"id": 11, "estado": "completado"}]}]"#,
        );
        let profile = &plan.profiles()[0];
        assert_eq!(profile.profile.created_at, None);
        assert!(!profile.scheduled_habits[0].active);
        assert!(profile.scheduled_habits[1].active);
        assert_eq!(profile.history[0].status, HabitStatus::NotCompleted);
        assert_eq!(profile.history[1].status, HabitStatus::Completed);
    }

    #[test]
    fn shared_emails_reported() {
        let plan = plan(
            r#"[{"id": 1, "email": "a@x.com"}, {"id": 2, "email": "a@x.com"},
                {"id": 3, "email": ""}, {"id": 4, "email": ""}]"#,
        );
        assert_eq!(plan.shared_emails(), vec![("a@x.com".to_string(), vec![1, 2])]);
    }
}
