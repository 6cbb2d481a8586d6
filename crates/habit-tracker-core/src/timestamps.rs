//! Timestamp parsing and conversion utilities.
//!
//! Snapshot timestamps are ISO-8601 text. Anything that does not parse is
//! treated as absent rather than as an error, so a bad `fecha_creacion` never
//! blocks a sync pass.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Microseconds per second
const MICROS_PER_SECOND: i64 = 1_000_000;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse ISO-8601 text into a naive UTC datetime.
///
/// Offset-bearing values are converted to UTC; naive values are taken as-is.
#[must_use]
pub fn parse_iso_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if let Some(dt) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Convert chrono `NaiveDateTime` to microseconds since Unix epoch.
#[inline]
#[must_use]
pub fn naive_to_micros(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

/// Convert microseconds since Unix epoch to chrono `NaiveDateTime`.
///
/// Values outside chrono's range clamp to the representable bounds.
#[must_use]
pub fn micros_to_naive(micros: i64) -> NaiveDateTime {
    let secs = micros.div_euclid(MICROS_PER_SECOND);
    let sub_micros = micros.rem_euclid(MICROS_PER_SECOND);
    let nsecs = u32::try_from(sub_micros * 1000).unwrap_or(0);
    Utc.timestamp_opt(secs, nsecs)
        .single()
        .unwrap_or(if micros < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
        .naive_utc()
}

/// Parse optional ISO-8601 text straight to stored microseconds.
#[must_use]
pub fn iso_to_micros(raw: Option<&str>) -> Option<i64> {
    raw.and_then(parse_iso_timestamp).map(naive_to_micros)
}

/// Current local time as ISO-8601 text, the format the profile store writes.
#[must_use]
pub fn now_iso() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
