//! Canonical id normalization.
//!
//! Snapshot ids arrive as JSON integers, integer-valued strings (usually epoch
//! seconds rendered by the profile store), or not at all. The relational layer
//! keys everything by a non-negative `i64`, so every raw id goes through
//! [`IdNormalizer::normalize`]:
//!
//! | Raw value                       | Result                  |
//! |---------------------------------|-------------------------|
//! | absent / `null`                 | fresh time-based id     |
//! | integer `>= 0`                  | that integer            |
//! | string parsing to `i64 >= 0`    | that integer            |
//! | anything else                   | fresh time-based id     |
//!
//! The fallback is lossy: the original value is discarded. Replacements are
//! reported through a `warn!` event so operators can find them.
//!
//! Fresh ids are epoch seconds with a per-normalizer high-water mark, so two
//! records without ids in the same second still get distinct values within one
//! process. Separate processes can collide.
//!
//! The mark is `max(now, last + 1)`, so a pass that generates more ids than
//! seconds elapse runs ahead of the wall clock: a thousand ids minted in one
//! second end a thousand seconds in the future, and later fresh ids keep
//! counting from there until real time catches up. Fresh ids are therefore
//! unique and increasing but are not reliable creation times.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde_json::Value;

/// Source of wall-clock seconds for fresh ids.
pub trait IdClock: Send + Sync {
    /// Current time in whole seconds since the Unix epoch.
    fn now_secs(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl IdClock for SystemClock {
    fn now_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

impl<F> IdClock for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now_secs(&self) -> i64 {
        self()
    }
}

/// How a canonical id was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// The raw value was already a canonical integer.
    Supplied,
    /// No raw value was present; a fresh id was issued.
    Generated,
    /// The raw value could not be represented and was replaced by a fresh id.
    Replaced,
}

/// Parse a raw JSON id into a canonical non-negative integer, if it is one.
#[must_use]
pub fn parse_canonical_id(raw: &Value) -> Option<i64> {
    let parsed = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.filter(|id| *id >= 0)
}

/// Coerces raw snapshot ids into canonical integer keys.
pub struct IdNormalizer<C: IdClock = SystemClock> {
    clock: C,
    last_issued: AtomicI64,
}

impl Default for IdNormalizer<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl IdNormalizer<SystemClock> {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: IdClock> IdNormalizer<C> {
    pub const fn with_clock(clock: C) -> Self {
        Self {
            clock,
            last_issued: AtomicI64::new(0),
        }
    }

    /// Normalize a raw id, issuing a fresh one when it is absent or unusable.
    pub fn normalize(&self, raw: Option<&Value>) -> i64 {
        self.normalize_with_source(raw).0
    }

    /// Like [`normalize`](Self::normalize) but also reports where the id came from.
    pub fn normalize_with_source(&self, raw: Option<&Value>) -> (i64, IdSource) {
        match raw {
            None | Some(Value::Null) => (self.fresh_id(), IdSource::Generated),
            Some(value) => match parse_canonical_id(value) {
                Some(id) => (id, IdSource::Supplied),
                None => {
                    let id = self.fresh_id();
                    tracing::warn!(raw_id = %value, replacement = id, "unrepresentable id replaced");
                    (id, IdSource::Replaced)
                }
            },
        }
    }

    /// Issue a fresh time-based id, strictly greater than any previously issued
    /// by this normalizer.
    pub fn fresh_id(&self) -> i64 {
        let now = self.clock.now_secs().max(0);
        let mut last = self.last_issued.load(Ordering::Relaxed);
        loop {
            let next = now.max(last.saturating_add(1));
            match self.last_issued.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(observed) => last = observed,
            }
        }
    }
}

impl<C: IdClock> std::fmt::Debug for IdNormalizer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdNormalizer")
            .field("last_issued", &self.last_issued.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
