//! Error types for the database layer

use thiserror::Error;

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    /// The database could not be opened. Fatal at startup.
    #[error("Connection error: {0}")]
    Connection(String),

    /// `SQLite` error from underlying driver
    #[error("SQLite error: {0}")]
    Sqlite(String),

    /// Lock contention (`SQLITE_BUSY` / `SQLITE_LOCKED`).
    #[error("Resource temporarily busy: {0}")]
    ResourceBusy(String),

    /// Required tables are missing or the schema could not be created.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A step of a reconcile or prune transaction failed; the transaction was
    /// rolled back.
    #[error("{operation} failed{}: {source}", profile_suffix(.profile_id))]
    Transaction {
        operation: &'static str,
        profile_id: Option<i64>,
        #[source]
        source: Box<DbError>,
    },
}

/// Result type alias for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

#[allow(clippy::ref_option)]
fn profile_suffix(profile_id: &Option<i64>) -> String {
    profile_id.map_or_else(String::new, |id| format!(" for profile {id}"))
}

impl DbError {
    /// Attach the failing operation (and profile, when known) to an error.
    ///
    /// Errors that already carry an operation are returned unchanged.
    #[must_use]
    pub fn in_operation(self, operation: &'static str, profile_id: Option<i64>) -> Self {
        match self {
            already @ Self::Transaction { .. } => already,
            other => Self::Transaction {
                operation,
                profile_id,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping operation context.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Transaction { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether retrying the same work later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.root(), Self::ResourceBusy(_))
    }

    /// Stable code for log fields.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self.root() {
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::ResourceBusy(_) => "RESOURCE_BUSY",
            Self::Schema(_) => "SCHEMA_ERROR",
            _ => "TRANSACTION_ERROR",
        }
    }
}

/// Check whether an error message indicates a database lock/busy condition.
#[must_use]
pub fn is_lock_error(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("database is locked")
        || lower.contains("database is busy")
        || lower.contains("database table is locked")
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::ResourceBusy(e.to_string())
            }
            _ => {
                let msg = e.to_string();
                if is_lock_error(&msg) {
                    Self::ResourceBusy(msg)
                } else {
                    Self::Sqlite(msg)
                }
            }
        }
    }
}
