//! Timestamp helpers shared by the context, events and reports.

use chrono::{DateTime, SecondsFormat, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns the current UTC time as an RFC 3339 string with microseconds.
///
/// # Examples
///
/// ```
/// use skillflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with('Z'));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Returns the seconds elapsed between two timestamps.
///
/// Negative spans (clock skew) clamp to zero.
#[must_use]
pub fn elapsed_seconds(start: Timestamp, end: Timestamp) -> f64 {
    let micros = (end - start).num_microseconds().unwrap_or(i64::MAX);
    #[allow(clippy::cast_precision_loss)]
    let secs = micros as f64 / 1_000_000.0;
    secs.max(0.0)
}
