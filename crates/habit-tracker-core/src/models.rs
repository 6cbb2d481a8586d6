//! Snapshot data model.
//!
//! These records mirror the flat JSON profile file exactly as the profile store
//! writes it: Spanish field names, ids as loose JSON values, timestamps as
//! ISO-8601 text. English spellings are accepted as aliases on input. Unknown
//! fields are kept in `extra` so rewriting the file does not drop them.
//!
//! Decoding is lenient below the top-level array: a field of the wrong type
//! decodes as absent and a list entry that is not an object is skipped, so one
//! hand-edited profile cannot fail the whole snapshot.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// HabitStatus
// =============================================================================

/// Completion status of a history entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitStatus {
    Completed,
    #[default]
    NotCompleted,
}

impl HabitStatus {
    /// Stored spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NotCompleted => "not_completed",
        }
    }

    /// Parse a status, accepting the legacy Spanish spellings.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "completed" | "completado" => Some(Self::Completed),
            "not_completed" | "no_completado" => Some(Self::NotCompleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for HabitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HabitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown habit status: {s:?}"))
    }
}

impl<'de> Deserialize<'de> for HabitStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Profile
// =============================================================================

/// One profile object in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(
        rename = "nombre",
        alias = "name",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Password hash. Never returned to callers of the profile store.
    #[serde(
        rename = "contraseña",
        alias = "password",
        alias = "credential_hash",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub credential: Option<String>,

    #[serde(
        rename = "fecha_creacion",
        alias = "created_at",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<String>,

    #[serde(
        rename = "habitos_programados",
        alias = "scheduled_habits",
        default,
        deserialize_with = "lenient_list"
    )]
    pub scheduled_habits: Vec<ScheduledHabitRecord>,

    #[serde(
        rename = "historial_habitos",
        alias = "history",
        default,
        deserialize_with = "lenient_list"
    )]
    pub history: Vec<HistoryRecord>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileRecord {
    /// Render the raw id as text, the way the profile store addresses profiles.
    #[must_use]
    pub fn id_text(&self) -> Option<String> {
        value_text(self.id.as_ref())
    }

    /// Whether this record is addressed by `id`.
    #[must_use]
    pub fn has_id(&self, id: &str) -> bool {
        self.id_text().as_deref() == Some(id)
    }

    /// Copy with the credential removed.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            credential: None,
            ..self.clone()
        }
    }
}

// =============================================================================
// ScheduledHabit
// =============================================================================

/// A habit the user plans to perform at a time of day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduledHabitRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(
        rename = "nombre",
        alias = "name",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(
        rename = "hora",
        alias = "time",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<String>,

    #[serde(
        rename = "categoria",
        alias = "category",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<String>,

    /// Absent or unreadable means active.
    #[serde(
        rename = "activo",
        alias = "active",
        default,
        deserialize_with = "lenient_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub active: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScheduledHabitRecord {
    #[must_use]
    pub fn id_text(&self) -> Option<String> {
        value_text(self.id.as_ref())
    }

    /// Whether this habit is addressed by `id`.
    #[must_use]
    pub fn has_id(&self, id: &str) -> bool {
        self.id_text().as_deref() == Some(id)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }
}

// =============================================================================
// HistoryEntry
// =============================================================================

/// A recorded completion (or miss) of a habit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(
        rename = "nombre",
        alias = "name",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(
        rename = "hora",
        alias = "time",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<String>,

    #[serde(
        rename = "estado",
        alias = "status",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,

    #[serde(
        rename = "fecha",
        alias = "completed_at",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HistoryRecord {
    /// Parsed status; `None` when absent, empty or unrecognized.
    #[must_use]
    pub fn status(&self) -> Option<HabitStatus> {
        self.status.as_deref().and_then(HabitStatus::parse)
    }

    /// Status text that is present but not a known status.
    #[must_use]
    pub fn unrecognized_status(&self) -> Option<&str> {
        self.status
            .as_deref()
            .filter(|raw| !raw.trim().is_empty() && HabitStatus::parse(raw).is_none())
    }

    #[must_use]
    pub fn status_or_default(&self) -> HabitStatus {
        self.status().unwrap_or_default()
    }
}

// =============================================================================
// Lenient field decoding
// =============================================================================

fn value_text(id: Option<&Value>) -> Option<String> {
    match id? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// `null` or a non-array is empty; entries that do not decode are skipped.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(Value::Array(items)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed snapshot entry");
                None
            }
        })
        .collect())
}

/// Strings as given, numbers as their decimal text, anything else absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Only text can be an ISO-8601 timestamp; anything else is absent.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Booleans, numbers (non-zero is true) and the text `true`/`false`/`1`/`0`.
/// Anything else is absent.
fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => Some(n.as_f64().is_some_and(|v| v != 0.0)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}
