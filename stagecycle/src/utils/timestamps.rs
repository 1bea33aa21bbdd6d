//! Timestamp arithmetic for the scheduler.
//!
//! Job times are UTC instants; offsets returned by jobs are fractional
//! seconds.

use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use std::time::Duration;

/// A point in time on the scheduler timeline.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns the Unix time of `ts` in fractional seconds.
#[must_use]
pub fn unix_seconds(ts: &Timestamp) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

/// Converts fractional Unix seconds to a timestamp.
///
/// Returns `None` for values chrono cannot represent (NaN, infinities or
/// out-of-range instants).
#[must_use]
pub fn from_unix_seconds(secs: f64) -> Option<Timestamp> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Utc.timestamp_micros(micros as i64).single()
}

/// Adds fractional seconds to a timestamp, saturating on overflow.
#[must_use]
pub fn add_seconds(ts: Timestamp, secs: f64) -> Timestamp {
    if !secs.is_finite() {
        return ts;
    }
    #[allow(clippy::cast_possible_truncation)]
    let micros = (secs * 1_000_000.0).round() as i64;
    ts.checked_add_signed(chrono::Duration::microseconds(micros))
        .unwrap_or(if micros >= 0 {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
}

/// Adds a std duration to a timestamp, saturating on overflow.
#[must_use]
pub fn add_duration(ts: Timestamp, duration: Duration) -> Timestamp {
    add_seconds(ts, duration.as_secs_f64())
}

/// Returns how long until `ts`, or zero if it has passed.
#[must_use]
pub fn duration_until(ts: &Timestamp) -> Duration {
    (*ts - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

/// Returns a uniformly random delay in `[0, bound)`.
#[must_use]
pub fn random_jitter(bound: Duration) -> Duration {
    if bound.is_zero() {
        return Duration::ZERO;
    }
    bound.mul_f64(rand::thread_rng().gen::<f64>())
}
