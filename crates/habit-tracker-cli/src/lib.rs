//! `habit-sync`: mirror the habit tracker profile file into the relational store.
//!
//! Runs a single reconciliation pass by default, or polls the file with
//! `--watch <SECONDS>` until SIGINT/SIGTERM.

#![forbid(unsafe_code)]

pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::Parser;
use habit_tracker_core::{Config, SnapshotError};
use habit_tracker_db::{DbError, SqliteBackend};
use tracing_subscriber::EnvFilter;

pub use watch::{
    PassSummary, TickOutcome, WatchLoop, WatchOptions, WatchOutcome, WatchState, WatchStats,
};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Stable code for log fields.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Snapshot(e) => e.error_code(),
            Self::Db(e) => e.error_code(),
            Self::Signal(_) => "SIGNAL_ERROR",
        }
    }

    /// Process exit status for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Snapshot(SnapshotError::NotFound { .. } | SnapshotError::Io { .. }) => 1,
            Self::Snapshot(SnapshotError::Parse { .. }) => 65,
            Self::Db(e) => match e.root() {
                DbError::Connection(_) => 69,
                DbError::Schema(_) => 78,
                DbError::ResourceBusy(_) => 75,
                _ => 70,
            },
            Self::Signal(_) => 71,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "habit-sync",
    version,
    about = "Mirror the habit tracker profile file into the relational database"
)]
pub struct Cli {
    /// Profile file to read (default: RUTA_ARCHIVO_DATOS or perfiles.json)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Poll the file every N seconds; 0 runs a single pass
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub watch: u64,

    /// Delete profiles that are no longer in the file
    #[arg(long)]
    pub prune: bool,

    /// Create the tables if they do not exist
    #[arg(long)]
    pub init_schema: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Loop options from flags, falling back to `config`.
    #[must_use]
    pub fn watch_options(&self, config: &Config) -> WatchOptions {
        WatchOptions {
            path: self
                .file
                .clone()
                .unwrap_or_else(|| config.snapshot_path.clone()),
            interval: Duration::from_secs(self.watch),
            prune: self.prune,
            poll_slice: Duration::from_millis(config.poll_slice_ms),
        }
    }
}

/// Parse arguments, run, and return the process exit status.
pub fn run() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::from_env();
    tracing::debug!(config = ?config, "configuration loaded");

    match execute(&cli, &config) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, code = err.error_code(), "habit-sync failed");
            err.exit_code()
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Connect, then run the watch loop until it completes or is interrupted.
///
/// A missing snapshot fails before any connection is opened.
pub fn execute(cli: &Cli, config: &Config) -> SyncResult<()> {
    let options = cli.watch_options(config);
    if !options.path.exists() {
        return Err(SnapshotError::NotFound { path: options.path }.into());
    }

    let backend = SqliteBackend::connect(&config.db)?;
    if cli.init_schema {
        backend.ensure_schema()?;
    } else {
        backend.verify_schema()?;
    }
    tracing::info!(database = %config.db.describe(), "connected");

    let shutdown = Arc::new(AtomicBool::new(false));
    register_shutdown(&shutdown)?;

    let mut watch = WatchLoop::new(options, backend, shutdown);
    let outcome = watch.run();
    let stats = watch.stats().clone();
    match watch.into_backend().close() {
        Ok(()) => tracing::info!("connection closed"),
        Err(err) => tracing::warn!(error = %err, "connection closed with error"),
    }
    tracing::debug!(passes = stats.passes, failures = stats.failures, "watch loop finished");

    match outcome {
        WatchOutcome::Completed(summary) => {
            tracing::debug!(pruned = summary.pruned.len(), "single pass complete");
            Ok(())
        }
        WatchOutcome::Interrupted => Ok(()),
        WatchOutcome::Failed(err) => Err(err),
    }
}

/// Raise `flag` on SIGINT or SIGTERM.
pub fn register_shutdown(flag: &Arc<AtomicBool>) -> SyncResult<()> {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(flag)).map_err(SyncError::Signal)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::parse_from([
            "habit-sync",
            "--file",
            "datos.json",
            "--watch",
            "5",
            "--prune",
            "--init-schema",
            "-v",
        ]);
        assert_eq!(cli.file.as_deref(), Some(std::path::Path::new("datos.json")));
        assert_eq!(cli.watch, 5);
        assert!(cli.prune && cli.init_schema && cli.verbose);
    }

    #[test]
    fn defaults_come_from_config() {
        let cli = Cli::parse_from(["habit-sync"]);
        let config = Config {
            snapshot_path: PathBuf::from("/data/perfiles.json"),
            poll_slice_ms: 50,
            ..Config::default()
        };
        let options = cli.watch_options(&config);
        assert_eq!(options.path, PathBuf::from("/data/perfiles.json"));
        assert!(options.is_single_shot());
        assert!(!options.prune);
        assert_eq!(options.poll_slice, Duration::from_millis(50));
    }

    #[test]
    fn exit_codes() {
        let missing = SyncError::from(SnapshotError::NotFound {
            path: PathBuf::from("x.json"),
        });
        assert_eq!(missing.exit_code(), 1);
        let busy = SyncError::from(DbError::ResourceBusy("locked".into()).in_operation("commit", None));
        assert_eq!(busy.exit_code(), 75);
        assert_eq!(SyncError::from(DbError::Connection("x".into())).exit_code(), 69);
    }
}
