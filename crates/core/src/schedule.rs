// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Weekly recurring schedules and next-run computation.
//!
//! A schedule is a set of weekdays plus a wall-clock time in an IANA
//! timezone. [`Schedule::next_after`] searches a bounded window and fails
//! closed with [`ScheduleError::NoSlot`] rather than looping.

use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Days searched by [`Schedule::next_after`] before giving up.
pub const SEARCH_WINDOW_DAYS: u64 = 14;

/// Errors from schedule parsing and next-run computation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid weekday: {0:?}")]
    InvalidDay(String),
    #[error("invalid time of day {0:?} (expected HH:MM)")]
    InvalidTime(String),
    #[error("unknown timezone: {0:?}")]
    InvalidTimezone(String),
    #[error("no matching slot within 14 days")]
    NoSlot,
}

/// Day of week, ordered Sun..Sat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Weekday {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

crate::string_enum! {
    Weekday {
        Sun => "sun",
        Mon => "mon",
        Tue => "tue",
        Wed => "wed",
        Thu => "thu",
        Fri => "fri",
        Sat => "sat",
    }
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    /// Days used when a schedule names none.
    pub const WORKDAYS: [Weekday; 5] =
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri];

    pub fn from_chrono(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Sun => Weekday::Sun,
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
        }
    }
}

/// Normalize weekday tokens: case-insensitive, deduplicated, sorted Sun..Sat.
///
/// An empty input yields Mon..Fri.
pub fn normalize_days<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Weekday>, ScheduleError> {
    let mut days = Vec::with_capacity(tokens.len());
    for token in tokens {
        let raw = token.as_ref();
        let day = Weekday::parse(raw).ok_or_else(|| ScheduleError::InvalidDay(raw.to_string()))?;
        days.push(day);
    }
    days.sort();
    days.dedup();
    if days.is_empty() {
        days.extend(Weekday::WORKDAYS);
    }
    Ok(days)
}

/// Wall-clock time of day, minute precision. Wire form `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    pub fn parse(raw: &str) -> Result<Self, ScheduleError> {
        let invalid = || ScheduleError::InvalidTime(raw.to_string());
        let (h, m) = raw.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour = h.parse::<u8>().map_err(|_| invalid())?;
        let minute = m.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }

    fn as_naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TimeOfDay::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(raw: &str) -> Result<Tz, ScheduleError> {
    raw.trim().parse::<Tz>().map_err(|_| ScheduleError::InvalidTimezone(raw.to_string()))
}

/// A weekly recurring slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub days: Vec<Weekday>,
    pub time_of_day: TimeOfDay,
    pub timezone: Tz,
}

impl Schedule {
    /// Build from raw tokens, normalizing days and validating time and zone.
    pub fn parse<S: AsRef<str>>(days: &[S], time: &str, timezone: &str) -> Result<Self, ScheduleError> {
        Ok(Self {
            days: normalize_days(days)?,
            time_of_day: TimeOfDay::parse(time)?,
            timezone: parse_timezone(timezone)?,
        })
    }

    /// Earliest slot strictly after `reference`.
    ///
    /// Ambiguous local times (DST fall-back) resolve to the earlier instant;
    /// nonexistent ones (DST spring-forward) shift forward one hour.
    pub fn next_after(&self, reference: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        if self.days.is_empty() {
            return Err(ScheduleError::NoSlot);
        }
        let start = reference.with_timezone(&self.timezone).date_naive();
        for offset in 0..=SEARCH_WINDOW_DAYS {
            let Some(date) = start.checked_add_days(Days::new(offset)) else {
                break;
            };
            if !self.days.contains(&Weekday::from_chrono(date.weekday())) {
                continue;
            }
            let Some(local) = resolve_local(&self.timezone, date.and_time(self.time_of_day.as_naive()))
            else {
                continue;
            };
            let candidate = local.with_timezone(&Utc);
            if candidate > reference {
                return Ok(candidate);
            }
        }
        Err(ScheduleError::NoSlot)
    }
}

fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest(),
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
