//! Persistence for the profile list.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use habit_tracker_core::{ProfileRecord, SnapshotError, load_snapshot};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::RepositoryError;

/// Loads and saves the complete profile list.
pub trait ProfileRepository {
    fn load(&self) -> Result<Vec<ProfileRecord>, RepositoryError>;

    fn save(&mut self, profiles: &[ProfileRecord]) -> Result<(), RepositoryError>;
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

/// The flat profile file the sync job reads.
///
/// Writes go to a temporary file in the same directory which then replaces the
/// target, so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file holding an empty list when it does not exist yet.
    pub fn initialize(&mut self) -> Result<(), RepositoryError> {
        if self.path.exists() {
            return Ok(());
        }
        tracing::info!(path = %self.path.display(), "creating empty profile file");
        self.save(&[])
    }

    fn write_error(&self, source: std::io::Error) -> RepositoryError {
        RepositoryError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl ProfileRepository for JsonFileRepository {
    fn load(&self) -> Result<Vec<ProfileRecord>, RepositoryError> {
        match load_snapshot(&self.path) {
            Err(SnapshotError::NotFound { .. }) => Ok(Vec::new()),
            other => Ok(other?),
        }
    }

    fn save(&mut self, profiles: &[ProfileRecord]) -> Result<(), RepositoryError> {
        let mut data = Vec::new();
        let mut ser = Serializer::with_formatter(&mut data, PrettyFormatter::with_indent(b"    "));
        profiles.serialize(&mut ser)?;
        data.push(b'\n');

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;
        temp.write_all(&data).map_err(|e| self.write_error(e))?;
        temp.as_file().sync_data().map_err(|e| self.write_error(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;
        tracing::debug!(path = %self.path.display(), profiles = profiles.len(), "profiles saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Repository that keeps the list in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    profiles: Vec<ProfileRecord>,
    saves: usize,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new(profiles: Vec<ProfileRecord>) -> Self {
        Self { profiles, saves: 0 }
    }

    #[must_use]
    pub fn profiles(&self) -> &[ProfileRecord] {
        &self.profiles
    }

    #[must_use]
    pub const fn saves(&self) -> usize {
        self.saves
    }
}

impl ProfileRepository for InMemoryRepository {
    fn load(&self) -> Result<Vec<ProfileRecord>, RepositoryError> {
        Ok(self.profiles.clone())
    }

    fn save(&mut self, profiles: &[ProfileRecord]) -> Result<(), RepositoryError> {
        self.profiles = profiles.to_vec();
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_empty_and_initializes() {
        let dir = TempDir::new().unwrap();
        let mut repo = JsonFileRepository::new(dir.path().join("perfiles.json"));
        assert!(repo.load().unwrap().is_empty());
        repo.initialize().unwrap();
        assert_eq!(fs::read_to_string(repo.path()).unwrap().trim(), "[]");
    }

    #[test]
    fn malformed_file_is_an_error_and_left_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("perfiles.json");
        fs::write(&path, "[{oops").unwrap();
        let mut repo = JsonFileRepository::new(&path);
        assert!(matches!(
            repo.load(),
            Err(RepositoryError::Load(SnapshotError::Parse { .. }))
        ));
        repo.initialize().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[{oops");
    }

    #[test]
    fn save_keeps_non_ascii_and_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("perfiles.json");
        fs::write(
            &path,
            r#"[{"id": "1", "nombre": "Íñigo", "contraseña": "x", "tema": "oscuro"}]"#,
        )
        .unwrap();
        let mut repo = JsonFileRepository::new(&path);
        let profiles = repo.load().unwrap();
        repo.save(&profiles).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"nombre\": \"Íñigo\""));
        assert!(text.contains("\"contraseña\": \"x\""));
        assert!(text.contains("\"tema\": \"oscuro\""));
        assert_eq!(repo.load().unwrap(), profiles);
    }
}
