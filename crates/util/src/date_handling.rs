//! # Date Handling Utilities
//!
//! Activation times in RTS load requests are written in day-of-year form,
//! `YYYY:DDD:HH:MM:SS[.fff]` (for example `2017:251:20:45:00`). This module
//! converts between that form and `chrono` UTC timestamps, and also accepts
//! RFC 3339 so hosts can pass ISO timestamps.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static DOY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}):(\d{3}):(\d{2}):(\d{2}):(\d{2})(?:\.(\d{1,3}))?$").expect("day-of-year regex should compile")
});

/// Failure to interpret a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    #[error("'{0}' is neither YYYY:DDD:HH:MM:SS[.fff] nor RFC 3339")]
    Unrecognized(String),
    #[error("'{0}' names a day or time that does not exist")]
    OutOfRange(String),
}

/// Parses a `YYYY:DDD:HH:MM:SS[.fff]` timestamp as UTC.
///
/// # Example
/// ```rust
/// use rts_util::date_handling::{format_doy, parse_doy};
///
/// let start = parse_doy("2018:001:00:00:01").unwrap();
/// assert_eq!(format_doy(&start), "2018:001:00:00:01.000");
/// ```
pub fn parse_doy(text: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = text.trim();
    let captures = DOY_PATTERN
        .captures(trimmed)
        .ok_or_else(|| DateParseError::Unrecognized(trimmed.to_string()))?;
    let number = |index: usize| -> u32 { captures.get(index).and_then(|m| m.as_str().parse().ok()).unwrap_or(0) };

    let millis = captures
        .get(6)
        .map(|fraction| {
            let digits = fraction.as_str();
            digits.parse::<u32>().unwrap_or(0) * 10u32.pow(3 - digits.len() as u32)
        })
        .unwrap_or(0);

    let year = i32::try_from(number(1)).map_err(|_| DateParseError::OutOfRange(trimmed.to_string()))?;
    NaiveDate::from_yo_opt(year, number(2))
        .and_then(|date| date.and_hms_milli_opt(number(3), number(4), number(5), millis))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DateParseError::OutOfRange(trimmed.to_string()))
}

/// Formats a timestamp as `YYYY:DDD:HH:MM:SS.fff`.
pub fn format_doy(timestamp: &DateTime<Utc>) -> String {
    format!(
        "{:04}:{:03}:{:02}:{:02}:{:02}.{:03}",
        timestamp.year(),
        timestamp.ordinal(),
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second(),
        timestamp.timestamp_subsec_millis()
    )
}

/// Accepts either day-of-year or RFC 3339 input.
pub fn parse_activation_time(text: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = text.trim();
    match parse_doy(trimmed) {
        Ok(timestamp) => Ok(timestamp),
        Err(DateParseError::OutOfRange(value)) => Err(DateParseError::OutOfRange(value)),
        Err(DateParseError::Unrecognized(_)) => DateTime::parse_from_rfc3339(trimmed)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(|_| DateParseError::Unrecognized(trimmed.to_string())),
    }
}

/// Unix time of 1998-01-01T00:00:00 UTC.
const CXC_EPOCH_UNIX_SECONDS: i64 = 883_612_800;
/// TT minus UTC at 1998.0: 31 leap seconds plus 32.184.
const CXC_EPOCH_OFFSET_MILLIS: i64 = 63_184;
/// Unix times at which each leap second since 1998 took effect.
const LEAP_SECONDS_UNIX: [i64; 6] = [
    915_148_800,   // 1999-01-01
    1_136_073_600, // 2006-01-01
    1_230_768_000, // 2009-01-01
    1_341_100_800, // 2012-07-01
    1_435_708_800, // 2015-07-01
    1_483_228_800, // 2017-01-01
];

/// Chandra CXC seconds: TT seconds elapsed since 1998.0, millisecond precision.
///
/// This is the `time` column thermal-model consumers read from exported
/// timelines. New leap seconds must be appended to the table above.
pub fn cxc_seconds(timestamp: &DateTime<Utc>) -> f64 {
    let unix = timestamp.timestamp();
    let leaps = LEAP_SECONDS_UNIX.iter().filter(|&&leap| unix >= leap).count() as i64;
    let millis = timestamp.timestamp_millis() - CXC_EPOCH_UNIX_SECONDS * 1_000 + CXC_EPOCH_OFFSET_MILLIS + leaps * 1_000;
    millis as f64 / 1_000.0
}
