//! Relative-time phrase conversion.
//!
//! The profile feeds render some instants only as display strings such as
//! `"3 months ago"` or `"1 year 2 weeks ago"`. [`normalize_relative`] turns such
//! a phrase into an absolute instant against an injected reference time, so the
//! result never depends on the wall clock.
//!
//! Phrases are read as whitespace-separated `(magnitude, unit)` pairs from left
//! to right. Units use fixed approximations (a month is 30 days, a year 365
//! days). Unknown unit tokens add nothing, and a trailing unpaired token (the
//! usual `"ago"`) is ignored.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use thiserror::Error;

pub const SECONDS_PER_YEAR: i64 = 31_536_000;
pub const SECONDS_PER_MONTH: i64 = 2_592_000;
pub const SECONDS_PER_WEEK: i64 = 604_800;
pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_MINUTE: i64 = 60;

/// Phrases containing any of these mean "now".
const JUST_NOW_MARKERS: &[&str] = &["few seconds ago", "just now"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("invalid magnitude {token:?} in relative time {phrase:?}")]
    InvalidMagnitude { phrase: String, token: String },

    #[error("epoch timestamp {0} is out of range")]
    OutOfRange(i64),
}

/// Seconds represented by one `unit`, or `None` for an unrecognised token.
pub fn seconds_per_unit(unit: &str) -> Option<i64> {
    match unit {
        "year" | "years" => Some(SECONDS_PER_YEAR),
        "month" | "months" => Some(SECONDS_PER_MONTH),
        "week" | "weeks" => Some(SECONDS_PER_WEEK),
        "day" | "days" => Some(SECONDS_PER_DAY),
        "hour" | "hours" => Some(SECONDS_PER_HOUR),
        "minute" | "minutes" => Some(SECONDS_PER_MINUTE),
        "second" | "seconds" => Some(1),
        _ => None,
    }
}

/// Converts a relative-time phrase into the instant it describes, relative to `now`.
///
/// Fails only when a magnitude token is not a non-negative integer; nothing
/// accumulated before the bad token is returned.
pub fn normalize_relative(
    phrase: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimestampError> {
    if JUST_NOW_MARKERS.iter().any(|marker| phrase.contains(marker)) {
        return Ok(now);
    }

    let tokens: Vec<&str> = phrase.split_whitespace().collect();
    let mut offset: i64 = 0;

    for pair in tokens.chunks_exact(2) {
        let (magnitude, unit) = (pair[0], pair[1].trim_end_matches(','));
        let magnitude: u32 =
            magnitude
                .parse()
                .map_err(|_| TimestampError::InvalidMagnitude {
                    phrase: phrase.to_string(),
                    token: magnitude.to_string(),
                })?;

        if let Some(seconds) = seconds_per_unit(unit) {
            offset = offset.saturating_add(i64::from(magnitude).saturating_mul(seconds));
        }
    }

    Ok(subtract_seconds(now, offset))
}

/// Converts epoch seconds into an instant.
pub fn from_epoch_seconds(seconds: i64) -> Result<DateTime<Utc>, TimestampError> {
    DateTime::from_timestamp(seconds, 0).ok_or(TimestampError::OutOfRange(seconds))
}

/// RFC 3339 rendering used for every timestamp in the domain records.
pub fn to_iso8601(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// Saturates at the earliest representable instant so larger offsets never yield a later result.
fn subtract_seconds(now: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
