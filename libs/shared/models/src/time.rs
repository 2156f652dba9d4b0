// libs/shared/models/src/time.rs
//
// Wall-clock helpers for session and slot windows. All windows are
// half-open [start, end) and never cross midnight.

use chrono::{NaiveTime, Timelike};
use thiserror::Error;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("Invalid time format '{0}', expected HH:MM")]
    Parse(String),

    #[error("Time arithmetic leaves the day: {0}")]
    OutOfDay(String),
}

/// Parse `HH:MM` (or `HH:MM:SS`, seconds are dropped).
pub fn parse_hhmm(value: &str) -> Result<NaiveTime, TimeError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map(truncate_to_minute)
        .map_err(|_| TimeError::Parse(value.to_string()))
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Minutes since midnight.
pub fn to_minutes(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

pub fn from_minutes(minutes: u32) -> Result<NaiveTime, TimeError> {
    if minutes >= MINUTES_PER_DAY {
        return Err(TimeError::OutOfDay(format!("{} minutes past midnight", minutes)));
    }
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
        .ok_or_else(|| TimeError::OutOfDay(format!("{} minutes past midnight", minutes)))
}

pub fn add_minutes(time: NaiveTime, minutes: i64) -> Result<NaiveTime, TimeError> {
    let shifted = to_minutes(time) as i64 + minutes;
    if !(0..MINUTES_PER_DAY as i64).contains(&shifted) {
        return Err(TimeError::OutOfDay(format!(
            "{} {:+} minutes",
            format_hhmm(time),
            minutes
        )));
    }
    from_minutes(shifted as u32)
}

pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> i64 {
    to_minutes(end) as i64 - to_minutes(start) as i64
}

/// `inner` lies entirely inside `outer`.
pub fn window_contains(outer: (NaiveTime, NaiveTime), inner: (NaiveTime, NaiveTime)) -> bool {
    inner.0 >= outer.0 && inner.1 <= outer.1
}

pub fn window_contains_point(window: (NaiveTime, NaiveTime), point: NaiveTime) -> bool {
    point >= window.0 && point < window.1
}

pub fn windows_overlap(a: (NaiveTime, NaiveTime), b: (NaiveTime, NaiveTime)) -> bool {
    !(a.1 <= b.0 || a.0 >= b.1)
}

/// Serde adapter writing `NaiveTime` as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_hhmm(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hhmm(&raw).map_err(serde::de::Error::custom)
    }
}

pub mod hhmm_option {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_some(&super::format_hhmm(*t)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|value| super::parse_hhmm(&value).map_err(serde::de::Error::custom))
            .transpose()
    }
}
