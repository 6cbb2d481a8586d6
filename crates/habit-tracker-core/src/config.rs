//! Configuration management for the habit tracker
//!
//! Configuration is loaded once from environment variables, falling back to a
//! `.env` file in the working directory. The resulting [`Config`] value is passed
//! explicitly to every component; nothing below the binary reads the
//! environment on its own.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default snapshot file name.
pub const DEFAULT_SNAPSHOT_FILE: &str = "perfiles.json";

/// Default sleep slice used while idling between polls.
pub const DEFAULT_POLL_SLICE_MS: u64 = 200;

/// Relational database connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "mi_basedatos".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
        }
    }
}

impl DbConfig {
    /// Connection description safe for logs (password redacted).
    #[must_use]
    pub fn describe(&self) -> String {
        let password = if self.password.is_empty() { "" } else { "***" };
        format!(
            "host={} port={} db={} user={} password={password}",
            self.host, self.port, self.name, self.user
        )
    }

    /// Database file used by the `SQLite` backend: `name`, with `.db` appended
    /// when it has no extension.
    #[must_use]
    pub fn sqlite_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.name);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension("db")
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .finish()
    }
}

/// Main configuration struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db: DbConfig,
    /// Snapshot path used when `--file` is not given.
    pub snapshot_path: PathBuf,
    /// Sleep granularity while waiting for the next poll (milliseconds).
    pub poll_slice_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_FILE),
            poll_slice_ms: DEFAULT_POLL_SLICE_MS,
        }
    }
}

impl Config {
    /// Load configuration from the environment (and `.env`).
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(env_value)
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let db = DbConfig {
            host: string("DB_HOST", &defaults.db.host),
            port: lookup("DB_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.db.port),
            name: string("DB_NAME", &defaults.db.name),
            user: string("DB_USER", &defaults.db.user),
            // An explicitly empty password is meaningful; keep it verbatim.
            password: lookup("DB_PASSWORD").unwrap_or_default(),
        };
        Self {
            db,
            snapshot_path: PathBuf::from(string("RUTA_ARCHIVO_DATOS", DEFAULT_SNAPSHOT_FILE)),
            poll_slice_ms: lookup("SYNC_POLL_SLICE_MS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.poll_slice_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Environment lookup with .env fallback
// ---------------------------------------------------------------------------

static DOTENV: OnceLock<HashMap<String, String>> = OnceLock::new();

/// Process environment first, then `.env` in the working directory.
///
/// The file is read at most once per process; a missing or unreadable file
/// contributes nothing.
#[must_use]
pub fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().or_else(|| {
        DOTENV
            .get_or_init(|| read_dotenv(Path::new(".env")))
            .get(key)
            .cloned()
    })
}

fn read_dotenv(path: &Path) -> HashMap<String, String> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let values = parse_dotenv(&contents);
            tracing::debug!(path = %path.display(), keys = values.len(), "loaded .env");
            values
        }
        Err(_) => HashMap::new(),
    }
}

/// Parse `KEY=value` lines. Comments, blank lines and an `export ` prefix are
/// tolerated; matching quotes around the value are stripped.
#[must_use]
pub fn parse_dotenv(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line
                .strip_prefix("export ")
                .unwrap_or(line)
                .split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), unquote(value)))
        })
        .collect()
}

fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    let quoted = ['"', '\''].into_iter().find_map(|quote| {
        trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.split_once(quote))
            .map(|(inner, _)| inner)
    });
    match quoted {
        Some(inner) => inner.to_string(),
        // Unquoted: drop an inline comment.
        None => trimmed
            .split_once(" #")
            .map_or(trimmed, |(value, _)| value.trim_end())
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn defaults_match_legacy_deployment() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.db.host, "localhost");
        assert_eq!(config.db.port, 5432);
        assert_eq!(config.db.name, "mi_basedatos");
        assert_eq!(config.db.user, "postgres");
        assert_eq!(config.db.password, "");
        assert_eq!(config.snapshot_path, PathBuf::from("perfiles.json"));
        assert_eq!(config.poll_slice_ms, DEFAULT_POLL_SLICE_MS);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let pairs = [
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_NAME", "habits.sqlite"),
            ("DB_PASSWORD", "s3cret"),
            ("RUTA_ARCHIVO_DATOS", "/srv/perfiles.json"),
        ];
        let config = Config::from_lookup(lookup_from(&pairs));
        assert_eq!(config.db.host, "db.internal");
        assert_eq!(config.db.port, 6543);
        assert_eq!(config.db.sqlite_path(), PathBuf::from("habits.sqlite"));
        assert_eq!(config.snapshot_path, PathBuf::from("/srv/perfiles.json"));
        assert!(!config.db.describe().contains("s3cret"));
        assert!(!format!("{:?}", config.db).contains("s3cret"));
    }

    #[test]
    fn invalid_port_falls_back() {
        let pairs = [("DB_PORT", "not-a-port")];
        assert_eq!(Config::from_lookup(lookup_from(&pairs)).db.port, 5432);
    }

    #[test]
    fn sqlite_path_appends_extension() {
        let db = DbConfig::default();
        assert_eq!(db.sqlite_path(), PathBuf::from("mi_basedatos.db"));
    }

    #[test]
    fn env_value_reads_process_environment() {
        // PATH is set for every test runner.
        assert_eq!(env_value("PATH"), env::var("PATH").ok());
        assert_eq!(env_value("HABIT_TRACKER_SURELY_UNSET_KEY"), None);
    }

    #[test]
    fn dotenv_file_feeds_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "DB_NAME=habitos\nRUTA_ARCHIVO_DATOS='/data/perfiles.json'\n").unwrap();
        let values = read_dotenv(&path);
        let config = Config::from_lookup(|key| values.get(key).cloned());
        assert_eq!(config.db.sqlite_path(), PathBuf::from("habitos.db"));
        assert_eq!(config.snapshot_path, PathBuf::from("/data/perfiles.json"));
        assert!(read_dotenv(&dir.path().join("missing.env")).is_empty());
    }

    #[test]
    fn dotenv_parsing_handles_quotes_and_comments() {
        let map = parse_dotenv(
            "# comment\nexport DB_HOST=\"db.local\"\nDB_USER='root'\nDB_PORT=3306 # mysql\n\nBROKEN\n",
        );
        assert_eq!(map.get("DB_HOST").map(String::as_str), Some("db.local"));
        assert_eq!(map.get("DB_USER").map(String::as_str), Some("root"));
        assert_eq!(map.get("DB_PORT").map(String::as_str), Some("3306"));
        assert!(!map.contains_key("BROKEN"));
    }
}
