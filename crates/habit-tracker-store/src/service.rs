//! Profile operations: CRUD, login, and appending habits or history.
//!
//! Every operation loads the full list, applies one change and saves the full
//! list back. Profiles handed to callers never carry the credential.

use habit_tracker_core::{
    HabitStatus, HistoryRecord, IdClock, IdNormalizer, ProfileRecord, ScheduledHabitRecord,
    SystemClock, now_iso,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::password::{hash_password, verify_password};
use crate::repository::ProfileRepository;

/// Category given to habits created without one.
pub const DEFAULT_CATEGORY: &str = "general";

// =============================================================================
// Inputs
// =============================================================================

/// Fields accepted when registering a profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProfile {
    #[serde(rename = "nombre", alias = "name", default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "contraseña", alias = "password", default)]
    pub password: String,
    #[serde(rename = "habitos_programados", alias = "scheduled_habits", default)]
    pub scheduled_habits: Vec<ScheduledHabitRecord>,
    #[serde(rename = "historial_habitos", alias = "history", default)]
    pub history: Vec<HistoryRecord>,
}

/// Partial update; `None` leaves the field as it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(rename = "nombre", alias = "name", default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "contraseña", alias = "password", default)]
    pub password: Option<String>,
    #[serde(rename = "habitos_programados", alias = "scheduled_habits", default)]
    pub scheduled_habits: Option<Vec<ScheduledHabitRecord>>,
    #[serde(rename = "historial_habitos", alias = "history", default)]
    pub history: Option<Vec<HistoryRecord>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewScheduledHabit {
    #[serde(rename = "nombre", alias = "name", default)]
    pub name: String,
    #[serde(rename = "hora", alias = "time", default)]
    pub time: String,
    #[serde(rename = "categoria", alias = "category", default)]
    pub category: Option<String>,
    #[serde(rename = "activo", alias = "active", default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewHistoryEntry {
    #[serde(rename = "nombre", alias = "name", default)]
    pub name: String,
    #[serde(rename = "hora", alias = "time", default)]
    pub time: String,
    /// Status text; must name a known [`HabitStatus`].
    #[serde(rename = "estado", alias = "status", default)]
    pub status: String,
    /// Scheduled habit this entry is for. Completing a habit whose `activo`
    /// is `false` (a one-off) removes it from the schedule.
    #[serde(rename = "habito_id", alias = "habit_id", default)]
    pub habit_id: Option<String>,
}

fn require(fields: &[(&str, &str)]) -> StoreResult<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}

// =============================================================================
// Service
// =============================================================================

/// Profile operations over a [`ProfileRepository`].
#[derive(Debug)]
pub struct ProfileService<R, C: IdClock = SystemClock> {
    repo: R,
    ids: IdNormalizer<C>,
}

impl<R: ProfileRepository> ProfileService<R> {
    pub const fn new(repo: R) -> Self {
        Self {
            repo,
            ids: IdNormalizer::new(),
        }
    }
}

impl<R: ProfileRepository, C: IdClock> ProfileService<R, C> {
    pub const fn with_ids(repo: R, ids: IdNormalizer<C>) -> Self {
        Self { repo, ids }
    }

    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repo
    }

    /// Register a profile. The password is stored only as an Argon2 hash.
    pub fn create(&mut self, input: NewProfile) -> StoreResult<ProfileRecord> {
        require(&[
            ("nombre", input.name.as_str()),
            ("email", input.email.as_str()),
            ("contraseña", input.password.as_str()),
        ])?;
        let mut profiles = self.repo.load()?;
        if profiles.iter().any(|p| p.email.as_deref() == Some(input.email.as_str())) {
            tracing::info!(email = %input.email, "registration rejected: email in use");
            return Err(StoreError::DuplicateEmail(input.email));
        }

        let id = self.unused_profile_id(&profiles);
        let profile = ProfileRecord {
            id: Some(Value::String(id.clone())),
            name: Some(input.name),
            email: Some(input.email),
            credential: Some(hash_password(&input.password)?),
            created_at: Some(now_iso()),
            scheduled_habits: input.scheduled_habits,
            history: input.history,
            extra: serde_json::Map::new(),
        };
        let redacted = profile.redacted();
        profiles.push(profile);
        self.repo.save(&profiles)?;
        tracing::info!(profile_id = %id, "profile created");
        Ok(redacted)
    }

    pub fn list(&self) -> StoreResult<Vec<ProfileRecord>> {
        Ok(self.repo.load()?.iter().map(ProfileRecord::redacted).collect())
    }

    pub fn get(&self, id: &str) -> StoreResult<ProfileRecord> {
        self.repo
            .load()?
            .iter()
            .find(|p| p.has_id(id))
            .map(ProfileRecord::redacted)
            .ok_or_else(|| StoreError::profile_not_found(id))
    }

    /// Apply `update` to profile `id`.
    ///
    /// The email only changes when it differs from the current one and no
    /// other profile uses it. An empty password leaves the credential alone.
    pub fn update(&mut self, id: &str, update: ProfileUpdate) -> StoreResult<ProfileRecord> {
        let mut profiles = self.repo.load()?;
        let index = position(&profiles, id)?;

        if let Some(email) = update.email {
            if profiles[index].email.as_deref() != Some(email.as_str()) {
                let taken = profiles
                    .iter()
                    .enumerate()
                    .any(|(i, p)| i != index && p.email.as_deref() == Some(email.as_str()));
                if taken {
                    tracing::info!(profile_id = %id, email = %email, "email change rejected: email in use");
                    return Err(StoreError::DuplicateEmail(email));
                }
                profiles[index].email = Some(email);
            }
        }
        let credential = match update.password.as_deref() {
            Some(password) if !password.is_empty() => Some(hash_password(password)?),
            _ => None,
        };

        let profile = &mut profiles[index];
        if let Some(name) = update.name {
            profile.name = Some(name);
        }
        if credential.is_some() {
            profile.credential = credential;
        }
        if let Some(habits) = update.scheduled_habits {
            profile.scheduled_habits = habits;
        }
        if let Some(history) = update.history {
            profile.history = history;
        }
        let redacted = profile.redacted();
        self.repo.save(&profiles)?;
        tracing::debug!(profile_id = %id, "profile updated");
        Ok(redacted)
    }

    pub fn delete(&mut self, id: &str) -> StoreResult<()> {
        let mut profiles = self.repo.load()?;
        let index = position(&profiles, id)?;
        profiles.remove(index);
        self.repo.save(&profiles)?;
        tracing::info!(profile_id = %id, "profile deleted");
        Ok(())
    }

    /// Check an email/password pair and return the matching profile.
    pub fn login(&self, email: &str, password: &str) -> StoreResult<ProfileRecord> {
        require(&[("email", email), ("contraseña", password)])?;
        let profiles = self.repo.load()?;
        let Some(profile) = profiles.iter().find(|p| p.email.as_deref() == Some(email)) else {
            tracing::info!(email = %email, "login rejected: unknown email");
            return Err(StoreError::NotFound {
                entity: "Profile",
                identifier: email.to_string(),
            });
        };
        let stored = profile.credential.as_deref().unwrap_or_default();
        if !verify_password(password, stored) {
            tracing::info!(email = %email, "login rejected: wrong password");
            return Err(StoreError::InvalidCredentials);
        }
        Ok(profile.redacted())
    }

    /// Append a scheduled habit to profile `id` and return it.
    pub fn add_scheduled_habit(
        &mut self,
        id: &str,
        input: NewScheduledHabit,
    ) -> StoreResult<ScheduledHabitRecord> {
        require(&[("nombre", input.name.as_str()), ("hora", input.time.as_str())])?;
        let mut profiles = self.repo.load()?;
        let index = position(&profiles, id)?;

        let habit = ScheduledHabitRecord {
            id: Some(Value::from(self.ids.fresh_id())),
            name: Some(input.name),
            time: Some(input.time),
            category: Some(
                input
                    .category
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            ),
            active: Some(input.active.unwrap_or(true)),
            extra: serde_json::Map::new(),
        };
        profiles[index].scheduled_habits.push(habit.clone());
        self.repo.save(&profiles)?;
        Ok(habit)
    }

    /// Remove scheduled habit `habit_id` from profile `profile_id` and return it.
    pub fn remove_scheduled_habit(
        &mut self,
        profile_id: &str,
        habit_id: &str,
    ) -> StoreResult<ScheduledHabitRecord> {
        let mut profiles = self.repo.load()?;
        let index = position(&profiles, profile_id)?;
        let habits = &mut profiles[index].scheduled_habits;
        let habit_index = habit_position(habits, habit_id)?;
        let removed = habits.remove(habit_index);
        self.repo.save(&profiles)?;
        tracing::debug!(profile_id = %profile_id, habit_id = %habit_id, "scheduled habit removed");
        Ok(removed)
    }

    /// Record a completion (or miss) for profile `id`, stamped with the current
    /// time, and return it.
    ///
    /// When the entry names a one-off habit and completes it, the habit leaves
    /// the schedule in the same save.
    pub fn add_history_entry(&mut self, id: &str, input: NewHistoryEntry) -> StoreResult<HistoryRecord> {
        require(&[
            ("nombre", input.name.as_str()),
            ("hora", input.time.as_str()),
            ("estado", input.status.as_str()),
        ])?;
        let status = HabitStatus::parse(&input.status).ok_or_else(|| {
            StoreError::Validation(format!(
                "estado must be completado or no_completado, got {:?}",
                input.status
            ))
        })?;
        let mut profiles = self.repo.load()?;
        let index = position(&profiles, id)?;
        let profile = &mut profiles[index];

        if let Some(habit_id) = input.habit_id.as_deref() {
            let habit_index = habit_position(&profile.scheduled_habits, habit_id)?;
            if status == HabitStatus::Completed && !profile.scheduled_habits[habit_index].is_active() {
                profile.scheduled_habits.remove(habit_index);
                tracing::debug!(profile_id = %id, habit_id = %habit_id, "one-off habit completed, unscheduled");
            }
        }

        let entry = HistoryRecord {
            id: Some(Value::from(self.ids.fresh_id())),
            name: Some(input.name),
            time: Some(input.time),
            status: Some(input.status.trim().to_string()),
            completed_at: Some(now_iso()),
            extra: serde_json::Map::new(),
        };
        profile.history.push(entry.clone());
        self.repo.save(&profiles)?;
        Ok(entry)
    }

    fn unused_profile_id(&self, profiles: &[ProfileRecord]) -> String {
        loop {
            let id = self.ids.fresh_id().to_string();
            if !profiles.iter().any(|p| p.has_id(&id)) {
                return id;
            }
        }
    }
}

fn position(profiles: &[ProfileRecord], id: &str) -> StoreResult<usize> {
    profiles
        .iter()
        .position(|p| p.has_id(id))
        .ok_or_else(|| StoreError::profile_not_found(id))
}

fn habit_position(habits: &[ScheduledHabitRecord], habit_id: &str) -> StoreResult<usize> {
    habits
        .iter()
        .position(|h| h.has_id(habit_id))
        .ok_or_else(|| StoreError::NotFound {
            entity: "Scheduled habit",
            identifier: habit_id.to_string(),
        })
}
