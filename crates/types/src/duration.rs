//! Relative offsets and bound durations.
//!
//! Every duration in a procedure is carried as an integer count of
//! milliseconds. Sums across long command lists therefore stay exact; there is
//! no floating-point accumulation anywhere between the source text and the
//! absolute timeline.

use std::{fmt, str::FromStr};

use chrono::TimeDelta;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;

/// `[D]DD:HH:MM:SS[.fff]` or the short `HH:MM:SS[.fff]` form used by `DELTA=`.
static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d{1,3}):)?(\d{1,2}):(\d{1,2}):(\d{1,2})(?:\.(\d{1,3}))?$").expect("duration regex should compile")
});

/// Failure to read a duration literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("duration is empty")]
    Empty,
    #[error("duration '{0}' is negative")]
    Negative(String),
    #[error("duration '{0}' does not match [D]DD:HH:MM:SS[.fff]")]
    Malformed(String),
    #[error("{field} value {value} is out of range in duration '{text}'")]
    FieldOutOfRange { field: &'static str, value: u64, text: String },
}

/// Non-negative duration with millisecond resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RtsDuration(u64);

impl RtsDuration {
    pub const ZERO: RtsDuration = RtsDuration(0);

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn from_secs(seconds: u64) -> Self {
        Self(seconds * MILLIS_PER_SECOND)
    }

    pub const fn from_hours(hours: u64) -> Self {
        Self(hours * MILLIS_PER_HOUR)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MILLIS_PER_SECOND as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: RtsDuration) -> Option<RtsDuration> {
        self.0.checked_add(other.0).map(RtsDuration)
    }

    /// Converts into a signed chrono delta for calendar arithmetic.
    ///
    /// Returns `None` when the value exceeds what `TimeDelta` can represent.
    pub fn to_time_delta(self) -> Option<TimeDelta> {
        let millis = i64::try_from(self.0).ok()?;
        TimeDelta::try_milliseconds(millis)
    }

    /// Parses `DDD:HH:MM:SS[.fff]` or `HH:MM:SS[.fff]`.
    ///
    /// The leading field counts days, not day-of-year. Minutes and seconds must
    /// be below sixty; hours must be below twenty-four when a day field is
    /// present. At most three fraction digits are accepted and they are read
    /// as a decimal fraction (`.5` is five hundred milliseconds).
    ///
    /// ```rust
    /// use rts_types::RtsDuration;
    ///
    /// assert_eq!(RtsDuration::parse("001:00:00:00").unwrap(), RtsDuration::from_hours(24));
    /// assert_eq!(RtsDuration::parse("00:00:01.000").unwrap(), RtsDuration::from_secs(1));
    /// assert!(RtsDuration::parse("-00:00:01").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, DurationParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DurationParseError::Empty);
        }
        if trimmed.starts_with('-') {
            return Err(DurationParseError::Negative(trimmed.to_string()));
        }

        let captures = DURATION_PATTERN
            .captures(trimmed)
            .ok_or_else(|| DurationParseError::Malformed(trimmed.to_string()))?;

        let field = |index: usize| -> u64 { captures.get(index).and_then(|m| m.as_str().parse().ok()).unwrap_or(0) };
        let has_days = captures.get(1).is_some();
        let (days, hours, minutes, seconds) = (field(1), field(2), field(3), field(4));

        let out_of_range = |field: &'static str, value: u64| DurationParseError::FieldOutOfRange {
            field,
            value,
            text: trimmed.to_string(),
        };
        if has_days && hours >= 24 {
            return Err(out_of_range("hours", hours));
        }
        if minutes >= 60 {
            return Err(out_of_range("minutes", minutes));
        }
        if seconds >= 60 {
            return Err(out_of_range("seconds", seconds));
        }

        let fraction_millis = match captures.get(5) {
            Some(fraction) => {
                let digits = fraction.as_str();
                let value: u64 = digits.parse().unwrap_or(0);
                value * 10u64.pow(3 - digits.len() as u32)
            }
            None => 0,
        };

        Ok(Self(
            days * MILLIS_PER_DAY + hours * MILLIS_PER_HOUR + minutes * MILLIS_PER_MINUTE + seconds * MILLIS_PER_SECOND + fraction_millis,
        ))
    }
}

impl FromStr for RtsDuration {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical `DDD:HH:MM:SS.fff` rendering.
impl fmt::Display for RtsDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut remaining = self.0;
        let days = remaining / MILLIS_PER_DAY;
        remaining %= MILLIS_PER_DAY;
        let hours = remaining / MILLIS_PER_HOUR;
        remaining %= MILLIS_PER_HOUR;
        let minutes = remaining / MILLIS_PER_MINUTE;
        remaining %= MILLIS_PER_MINUTE;
        let seconds = remaining / MILLIS_PER_SECOND;
        let millis = remaining % MILLIS_PER_SECOND;
        write!(f, "{days:03}:{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_form_as_day_count() {
        assert_eq!(RtsDuration::parse("001:15:00:00").unwrap(), RtsDuration::from_hours(39));
        assert_eq!(RtsDuration::parse("000:02:00:00").unwrap(), RtsDuration::from_secs(7_200));
        assert_eq!(RtsDuration::parse("000:00:00:01").unwrap(), RtsDuration::from_secs(1));
    }

    #[test]
    fn parses_short_delta_form() {
        assert_eq!(RtsDuration::parse("00:01:05.000").unwrap(), RtsDuration::from_secs(65));
        assert_eq!(RtsDuration::parse(" 00:00:01.025 ").unwrap(), RtsDuration::from_millis(1_025));
        assert_eq!(RtsDuration::parse("00:00:00.5").unwrap(), RtsDuration::from_millis(500));
    }

    #[test]
    fn rejects_malformed_and_negative_literals() {
        assert_eq!(RtsDuration::parse(""), Err(DurationParseError::Empty));
        assert!(matches!(RtsDuration::parse("-00:00:01"), Err(DurationParseError::Negative(_))));
        assert!(matches!(RtsDuration::parse("1:2"), Err(DurationParseError::Malformed(_))));
        assert!(matches!(RtsDuration::parse("00:00:01.0001"), Err(DurationParseError::Malformed(_))));
        assert!(matches!(RtsDuration::parse("&NUM_HOURS&"), Err(DurationParseError::Malformed(_))));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(matches!(
            RtsDuration::parse("000:24:00:00"),
            Err(DurationParseError::FieldOutOfRange { field: "hours", .. })
        ));
        assert!(matches!(
            RtsDuration::parse("00:60:00"),
            Err(DurationParseError::FieldOutOfRange { field: "minutes", .. })
        ));
        assert!(matches!(
            RtsDuration::parse("00:00:75"),
            Err(DurationParseError::FieldOutOfRange { field: "seconds", .. })
        ));
    }

    #[test]
    fn display_is_canonical_and_reparses() {
        let duration = RtsDuration::parse("00:01:05.250").unwrap();
        assert_eq!(duration.to_string(), "000:00:01:05.250");
        assert_eq!(RtsDuration::parse(&duration.to_string()).unwrap(), duration);
    }

    #[test]
    fn converts_to_time_delta() {
        let delta = RtsDuration::from_millis(1_500).to_time_delta().expect("delta");
        assert_eq!(delta.num_milliseconds(), 1_500);
    }
}
