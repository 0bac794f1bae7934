//! Calendar and clock types
//!
//! Sessions are scheduled in the practice's local wall-clock time
//! (`NaiveDate` + `NaiveTime`). A [`Timezone`] converts a slot to an
//! instant when a rule depends on "now", such as the late-cancel window.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use std::str::FromStr;

/// Timezone wrapper for the practice location
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Converts a UTC datetime to the local timezone
    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<Tz> {
        utc.with_timezone(&self.0)
    }

    /// Interprets a local wall-clock time as an instant
    ///
    /// Ambiguous times (DST fold) resolve to the earlier instant; times
    /// that do not exist locally (DST gap) return `None`.
    pub fn localize(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        local
            .and_local_timezone(self.0)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::Africa::Johannesburg)
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid slot: start {start} must be before end {end}")]
    InvalidSlot {
        start: String,
        end: String,
    },

    #[error("Invalid range: start {start} must not be after end {end}")]
    InvalidRange {
        start: String,
        end: String,
    },

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// A session slot on one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl TimeSlot {
    /// Creates a slot, rejecting empty or inverted time ranges
    pub fn new(date: NaiveDate, start_time: NaiveTime, end_time: NaiveTime) -> Result<Self, TemporalError> {
        if start_time >= end_time {
            return Err(TemporalError::InvalidSlot {
                start: start_time.to_string(),
                end: end_time.to_string(),
            });
        }
        Ok(Self { date, start_time, end_time })
    }

    /// Moves the slot to another date, keeping its times
    pub fn on(&self, date: NaiveDate) -> Self {
        Self { date, ..*self }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    /// Returns true if the two slots share any instant on the same day
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.date == other.date
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

/// An inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TemporalError> {
        if start > end {
            return Err(TemporalError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_slot_rejects_inverted_times() {
        let result = TimeSlot::new(date(2025, 3, 3), time(11, 0), time(10, 0));
        assert!(matches!(result, Err(TemporalError::InvalidSlot { .. })));
    }

    #[test]
    fn test_slot_overlap() {
        let a = TimeSlot::new(date(2025, 3, 3), time(10, 0), time(11, 0)).unwrap();
        let b = TimeSlot::new(date(2025, 3, 3), time(10, 30), time(11, 30)).unwrap();
        let c = TimeSlot::new(date(2025, 3, 3), time(11, 0), time(12, 0)).unwrap();

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&b.on(date(2025, 3, 4))));
    }

    #[test]
    fn test_johannesburg_localize() {
        let tz = Timezone::default();
        let utc = tz.localize(date(2025, 3, 3).and_time(time(10, 0))).unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-03-03T08:00:00+00:00");
    }

    #[test]
    fn test_range_contains_is_inclusive() {
        let range = DateRange::new(date(2025, 3, 1), date(2025, 3, 31)).unwrap();
        assert!(range.contains(date(2025, 3, 1)));
        assert!(range.contains(date(2025, 3, 31)));
        assert!(!range.contains(date(2025, 4, 1)));
        assert_eq!(range.days(), 31);
    }
}
