//! Timestamp conversion and formatting.
//!
//! The remote API reports instants as milliseconds since the Unix epoch and
//! uses `0` for "never happened". Everything inside the crate works with
//! `Option<DateTime<Utc>>` instead.

use chrono::{DateTime, SecondsFormat, Utc};

/// Placeholder shown in human output for an absent timestamp.
pub const NEVER: &str = "Never";

/// Convert epoch milliseconds to a UTC instant. `0` maps to `None`.
///
/// Values outside chrono's representable range also map to `None`.
#[must_use]
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

/// Strict ISO-8601 rendering (`2024-03-01T10:00:00Z`), empty when absent.
#[must_use]
pub fn to_strict_string(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Compact human rendering (`2024-03-01 10:00`), or [`NEVER`] when absent.
#[must_use]
pub fn to_display_string(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || NEVER.to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}
