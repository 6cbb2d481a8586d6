//! Watch loop: run reconciliation passes once or whenever the snapshot changes.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use habit_tracker_core::{IdClock, IdNormalizer, SystemClock, load_snapshot, snapshot_mtime};
use habit_tracker_db::{ReconcileReport, SyncBackend, SyncPlan, prune, reconcile};

use crate::SyncError;

/// What the loop does and how often.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub path: PathBuf,
    /// Time between polls; zero runs a single pass.
    pub interval: Duration,
    pub prune: bool,
    /// Sleep granularity between shutdown checks.
    pub poll_slice: Duration,
}

impl WatchOptions {
    #[must_use]
    pub const fn is_single_shot(&self) -> bool {
        self.interval.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Loading,
    Reconciling,
    Pruning,
    Terminated,
}

/// Result of one successful pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub reconciled: ReconcileReport,
    /// Profile ids removed by prune, ascending.
    pub pruned: Vec<i64>,
}

/// How [`WatchLoop::run`] ended.
#[derive(Debug)]
pub enum WatchOutcome {
    /// The single pass succeeded.
    Completed(PassSummary),
    /// The shutdown flag was raised.
    Interrupted,
    /// The single pass failed.
    Failed(SyncError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub passes: u64,
    pub failures: u64,
    pub last_summary: Option<PassSummary>,
}

/// What one polling tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The snapshot has not changed since the last successful pass.
    Unchanged,
    /// A pass ran and succeeded.
    Synced(PassSummary),
    /// A pass ran and failed; it is retried on the next tick.
    Failed(SyncError),
    /// The snapshot could not be stat'ed.
    Unavailable(SyncError),
}

/// Drives reconciliation passes against one backend.
pub struct WatchLoop<B: SyncBackend, C: IdClock = SystemClock> {
    options: WatchOptions,
    backend: B,
    shutdown: Arc<AtomicBool>,
    ids: IdNormalizer<C>,
    state: WatchState,
    last_mtime: Option<SystemTime>,
    unavailable_reported: bool,
    stats: WatchStats,
}

impl<B: SyncBackend> WatchLoop<B> {
    pub fn new(options: WatchOptions, backend: B, shutdown: Arc<AtomicBool>) -> Self {
        Self::with_ids(options, backend, shutdown, IdNormalizer::new())
    }
}

impl<B: SyncBackend, C: IdClock> WatchLoop<B, C> {
    pub fn with_ids(
        options: WatchOptions,
        backend: B,
        shutdown: Arc<AtomicBool>,
        ids: IdNormalizer<C>,
    ) -> Self {
        Self {
            options,
            backend,
            shutdown,
            ids,
            state: WatchState::Idle,
            last_mtime: None,
            unavailable_reported: false,
            stats: WatchStats::default(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> WatchState {
        self.state
    }

    #[must_use]
    pub const fn stats(&self) -> &WatchStats {
        &self.stats
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Give the backend back, ending the loop.
    pub fn into_backend(self) -> B {
        self.backend
    }

    fn set_state(&mut self, next: WatchState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "watch state");
            self.state = next;
        }
    }

    fn interrupted(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Run until the single pass ends or, when polling, until shutdown.
    pub fn run(&mut self) -> WatchOutcome {
        let outcome = if self.options.is_single_shot() {
            match self.run_pass() {
                Ok(summary) => WatchOutcome::Completed(summary),
                Err(err) => WatchOutcome::Failed(err),
            }
        } else {
            tracing::info!(
                path = %self.options.path.display(),
                interval_secs = self.options.interval.as_secs(),
                prune = self.options.prune,
                "watching snapshot"
            );
            while !self.interrupted() {
                self.tick();
                self.sleep_interruptibly(self.options.interval);
            }
            tracing::info!("interrupted, stopping watch loop");
            WatchOutcome::Interrupted
        };
        self.set_state(WatchState::Terminated);
        outcome
    }

    /// Poll once: run a pass when the snapshot mtime differs from the last
    /// successful pass.
    ///
    /// The mtime is only recorded after success, so a failed pass (malformed
    /// file, rolled-back transaction) is retried on the next tick.
    pub fn tick(&mut self) -> TickOutcome {
        let mtime = match snapshot_mtime(&self.options.path) {
            Ok(mtime) => mtime,
            Err(err) => {
                if !self.unavailable_reported {
                    tracing::warn!(error = %err, "snapshot unavailable, will retry");
                    self.unavailable_reported = true;
                }
                return TickOutcome::Unavailable(err.into());
            }
        };
        self.unavailable_reported = false;
        if self.last_mtime == Some(mtime) {
            return TickOutcome::Unchanged;
        }

        tracing::info!(path = %self.options.path.display(), "snapshot changed");
        match self.run_pass() {
            Ok(summary) => {
                self.last_mtime = Some(mtime);
                TickOutcome::Synced(summary)
            }
            Err(err) => {
                tracing::error!(error = %err, code = err.error_code(), "sync pass failed, will retry");
                TickOutcome::Failed(err)
            }
        }
    }

    /// One load, reconcile and optional prune.
    pub fn run_pass(&mut self) -> Result<PassSummary, SyncError> {
        let result = self.try_pass();
        self.set_state(WatchState::Idle);
        match &result {
            Ok(summary) => {
                self.stats.passes += 1;
                self.stats.last_summary = Some(summary.clone());
            }
            Err(_) => self.stats.failures += 1,
        }
        result
    }

    fn try_pass(&mut self) -> Result<PassSummary, SyncError> {
        self.set_state(WatchState::Loading);
        let records = load_snapshot(&self.options.path)?;
        let plan = SyncPlan::build(&records, &self.ids);

        self.set_state(WatchState::Reconciling);
        let reconciled = reconcile(&mut self.backend, &plan)?;

        let pruned = if self.options.prune {
            self.set_state(WatchState::Pruning);
            prune(&mut self.backend, &plan)?
        } else {
            Vec::new()
        };
        Ok(PassSummary { reconciled, pruned })
    }

    fn sleep_interruptibly(&self, total: Duration) {
        let slice = self.options.poll_slice.max(Duration::from_millis(1));
        let deadline = Instant::now() + total;
        while !self.interrupted() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(slice.min(deadline - now));
        }
    }
}

impl<B: SyncBackend, C: IdClock> std::fmt::Debug for WatchLoop<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchLoop")
            .field("options", &self.options)
            .field("backend", &self.backend.describe())
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use habit_tracker_db::{FailPoint, MemoryBackend};
    use std::fs;
    use tempfile::TempDir;

    fn options(dir: &TempDir, interval: Duration) -> WatchOptions {
        WatchOptions {
            path: dir.path().join("perfiles.json"),
            interval,
            prune: true,
            poll_slice: Duration::from_millis(5),
        }
    }

    fn flag() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn single_shot_completes_and_terminates() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir, Duration::ZERO);
        fs::write(&opts.path, r#"[{"id": 1, "habitos_programados": [{"id": 2}]}]"#).unwrap();

        let mut watch = WatchLoop::new(opts, MemoryBackend::new(), flag());
        let WatchOutcome::Completed(summary) = watch.run() else {
            panic!("expected completion");
        };
        assert_eq!(summary.reconciled.profiles, 1);
        assert_eq!(summary.reconciled.scheduled_habits, 1);
        assert_eq!(watch.state(), WatchState::Terminated);
        assert_eq!(watch.stats().passes, 1);
    }

    #[test]
    fn single_shot_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir, Duration::ZERO);
        fs::write(&opts.path, r#"[{"id": 1}]"#).unwrap();
        let mut backend = MemoryBackend::new();
        backend.fail_at(Some(FailPoint::Commit));

        let mut watch = WatchLoop::new(opts, backend, flag());
        assert!(matches!(watch.run(), WatchOutcome::Failed(SyncError::Db(_))));
        assert_eq!(watch.stats().failures, 1);
    }

    #[test]
    fn unchanged_snapshot_is_skipped() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir, Duration::from_secs(1));
        fs::write(&opts.path, "[]").unwrap();

        let mut watch = WatchLoop::new(opts, MemoryBackend::new(), flag());
        assert!(matches!(watch.tick(), TickOutcome::Synced(_)));
        assert!(matches!(watch.tick(), TickOutcome::Unchanged));
        assert_eq!(watch.stats().passes, 1);
    }

    #[test]
    fn raised_flag_stops_polling() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir, Duration::from_secs(3600));
        fs::write(&opts.path, "[]").unwrap();
        let shutdown = flag();

        let mut watch = WatchLoop::new(opts, MemoryBackend::new(), Arc::clone(&shutdown));
        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            shutdown.store(true, Ordering::Relaxed);
        });
        let started = Instant::now();
        assert!(matches!(watch.run(), WatchOutcome::Interrupted));
        raiser.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(watch.state(), WatchState::Terminated);
    }
}
