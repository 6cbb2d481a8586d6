//! Error types for the profile store

use std::path::PathBuf;

use habit_tracker_core::SnapshotError;
use thiserror::Error;

/// Failures reading or writing the profile file.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Load(#[from] SnapshotError),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode profiles: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Profile store error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// A required field is missing or a value is not acceptable.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// Entity not found
    #[error("{entity} not found: {identifier}")]
    NotFound {
        entity: &'static str,
        identifier: String,
    },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Credential hashing failed: {0}")]
    Hashing(String),
}

/// Result type alias for profile store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Create a profile-not-found error.
    #[must_use]
    pub fn profile_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Profile",
            identifier: identifier.into(),
        }
    }

    /// HTTP-like status class.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::DuplicateEmail(_) => 400,
            Self::InvalidCredentials => 401,
            Self::NotFound { .. } => 404,
            Self::Repository(_) | Self::Hashing(_) => 500,
        }
    }

    /// Stable code for log fields.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_ARGUMENT",
            Self::DuplicateEmail(_) => "DUPLICATE_EMAIL",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Repository(_) => "REPOSITORY_ERROR",
            Self::Hashing(_) => "HASHING_ERROR",
        }
    }

    /// Outcomes the caller caused, as opposed to store faults.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<SnapshotError> for StoreError {
    fn from(e: SnapshotError) -> Self {
        Self::Repository(RepositoryError::Load(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert_eq!(StoreError::Validation("x".into()).status_code(), 400);
        assert_eq!(StoreError::DuplicateEmail("a@x.com".into()).status_code(), 400);
        assert_eq!(StoreError::InvalidCredentials.status_code(), 401);
        assert_eq!(StoreError::profile_not_found("7").status_code(), 404);
        assert_eq!(StoreError::Hashing("x".into()).status_code(), 500);
        assert!(!StoreError::Hashing("x".into()).is_user_error());
    }

    #[test]
    fn not_found_message_names_entity() {
        assert_eq!(
            StoreError::profile_not_found("123").to_string(),
            "Profile not found: 123"
        );
    }
}
