//! Schedule time handling.
//!
//! Transit schedules express times as seconds since midnight of the service
//! day. Times past 24:00:00 are valid: a trip leaving at 23:50 that runs for
//! half an hour arrives at 24:20:00 of the same service day.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A time of the service day, in whole seconds since midnight.
///
/// # Examples
///
/// ```
/// use raptor_server::domain::ScheduleTime;
///
/// let t = ScheduleTime::parse("08:15:30").unwrap();
/// assert_eq!(t.seconds(), 8 * 3600 + 15 * 60 + 30);
/// assert_eq!(t.to_string(), "08:15:30");
///
/// // Overnight service-day times are allowed
/// let late = ScheduleTime::parse("25:10").unwrap();
/// assert_eq!(late.to_string(), "25:10:00");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScheduleTime(u32);

impl ScheduleTime {
    /// Midnight at the start of the service day.
    pub const MIDNIGHT: Self = Self(0);

    /// Create a time from seconds since midnight.
    pub const fn from_seconds(seconds: u32) -> Self {
        Self(seconds)
    }

    /// Create a time from hours, minutes and seconds.
    ///
    /// Hours may exceed 23; minutes and seconds must be below 60.
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Result<Self, TimeError> {
        if minutes > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }
        if seconds > 59 {
            return Err(TimeError::new("second must be 0-59"));
        }
        hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes * 60 + seconds))
            .map(Self)
            .ok_or_else(|| TimeError::new("hour out of range"))
    }

    /// Parse "HH:MM:SS" or "HH:MM".
    ///
    /// # Examples
    ///
    /// ```
    /// use raptor_server::domain::ScheduleTime;
    ///
    /// assert!(ScheduleTime::parse("00:00:00").is_ok());
    /// assert!(ScheduleTime::parse("07:05").is_ok());
    /// assert!(ScheduleTime::parse("30:00:00").is_ok());
    ///
    /// assert!(ScheduleTime::parse("0705").is_err());
    /// assert!(ScheduleTime::parse("07:5").is_err());
    /// assert!(ScheduleTime::parse("07:60").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let mut parts = s.split(':');
        let hours = parts
            .next()
            .ok_or_else(|| TimeError::new("expected HH:MM[:SS] format"))?;
        let minutes = parts
            .next()
            .ok_or_else(|| TimeError::new("expected HH:MM[:SS] format"))?;
        let seconds = parts.next();
        if parts.next().is_some() {
            return Err(TimeError::new("too many components"));
        }

        if hours.len() < 2 || !hours.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimeError::new("invalid hour digits"));
        }
        let hours: u32 = hours
            .parse()
            .map_err(|_| TimeError::new("hour out of range"))?;
        let minutes =
            parse_two_digits(minutes).ok_or_else(|| TimeError::new("invalid minute digits"))?;
        let seconds = match seconds {
            Some(sec) => {
                parse_two_digits(sec).ok_or_else(|| TimeError::new("invalid second digits"))?
            }
            None => 0,
        };

        Self::from_hms(hours, minutes, seconds)
    }

    /// Seconds since midnight.
    pub const fn seconds(self) -> u32 {
        self.0
    }

    /// Convert a wall-clock time of day.
    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self(time.num_seconds_from_midnight())
    }

    /// Convert to a wall-clock time of day.
    ///
    /// Returns `None` for times at or past 24:00:00.
    pub fn to_naive_time(self) -> Option<NaiveTime> {
        NaiveTime::from_num_seconds_from_midnight_opt(self.0, 0)
    }

    /// Add a number of seconds, returning `None` on overflow.
    pub fn checked_add(self, seconds: u32) -> Option<Self> {
        self.0.checked_add(seconds).map(Self)
    }

    /// Seconds elapsed since `earlier`, or `None` if `earlier` is later.
    pub fn seconds_since(self, earlier: Self) -> Option<u32> {
        self.0.checked_sub(earlier.0)
    }
}

/// Parse exactly two ASCII digits.
fn parse_two_digits(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}

impl FromStr for ScheduleTime {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScheduleTime({self})")
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 3600;
        let minutes = (self.0 % 3600) / 60;
        let seconds = self.0 % 60;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}

impl Serialize for ScheduleTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Times may be written as "HH:MM[:SS]" strings or as plain seconds.
#[derive(Deserialize)]
#[serde(untagged)]
enum TimeRepr {
    Seconds(u32),
    Text(String),
}

impl<'de> Deserialize<'de> for ScheduleTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match TimeRepr::deserialize(deserializer)? {
            TimeRepr::Seconds(secs) => Ok(Self(secs)),
            TimeRepr::Text(text) => Self::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_times() {
        assert_eq!(ScheduleTime::parse("00:00:00").unwrap().seconds(), 0);
        assert_eq!(ScheduleTime::parse("00:10").unwrap().seconds(), 600);
        assert_eq!(ScheduleTime::parse("23:59:59").unwrap().seconds(), 86_399);
        assert_eq!(ScheduleTime::parse("24:00:00").unwrap().seconds(), 86_400);
        assert_eq!(ScheduleTime::parse("100:00").unwrap().seconds(), 360_000);
    }

    #[test]
    fn parse_invalid_format() {
        assert!(ScheduleTime::parse("").is_err());
        assert!(ScheduleTime::parse("7:00").is_err());
        assert!(ScheduleTime::parse("07").is_err());
        assert!(ScheduleTime::parse("07:00:00:00").is_err());
        assert!(ScheduleTime::parse("07-00").is_err());
        assert!(ScheduleTime::parse("ab:cd").is_err());
        assert!(ScheduleTime::parse("07:00:6").is_err());
    }

    #[test]
    fn parse_out_of_range() {
        assert!(ScheduleTime::parse("07:60").is_err());
        assert!(ScheduleTime::parse("07:00:60").is_err());
        assert!(ScheduleTime::parse("99999999999:00").is_err());
    }

    #[test]
    fn display_pads_components() {
        assert_eq!(ScheduleTime::from_seconds(3661).to_string(), "01:01:01");
        assert_eq!(ScheduleTime::from_seconds(0).to_string(), "00:00:00");
        assert_eq!(ScheduleTime::from_seconds(90_000).to_string(), "25:00:00");
    }

    #[test]
    fn naive_time_conversion() {
        let t = NaiveTime::from_hms_opt(14, 30, 5).unwrap();
        let st = ScheduleTime::from_naive_time(t);
        assert_eq!(st.to_string(), "14:30:05");
        assert_eq!(st.to_naive_time(), Some(t));

        assert_eq!(ScheduleTime::from_seconds(86_400).to_naive_time(), None);
    }

    #[test]
    fn arithmetic() {
        let t = ScheduleTime::from_seconds(100);
        assert_eq!(t.checked_add(50), Some(ScheduleTime::from_seconds(150)));
        assert_eq!(ScheduleTime::from_seconds(u32::MAX).checked_add(1), None);
        assert_eq!(t.seconds_since(ScheduleTime::from_seconds(40)), Some(60));
        assert_eq!(t.seconds_since(ScheduleTime::from_seconds(140)), None);
    }

    #[test]
    fn serde_accepts_text_and_seconds() {
        let from_text: ScheduleTime = serde_json::from_str("\"08:00\"").unwrap();
        let from_secs: ScheduleTime = serde_json::from_str("28800").unwrap();
        assert_eq!(from_text, from_secs);

        let json = serde_json::to_string(&from_text).unwrap();
        assert_eq!(json, "\"08:00:00\"");

        assert!(serde_json::from_str::<ScheduleTime>("\"8am\"").is_err());
    }
}
