//! Billing period and timezone handling
//!
//! A billing run settles the invoices created during the previous calendar
//! month. Month boundaries are local midnights in the billing timezone,
//! expressed in UTC so they can be compared with invoice timestamps.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Timezone wrapper used to anchor billing periods
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
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s.trim())
            .map(Timezone)
            .map_err(|_| TemporalError::UnknownTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Returns the calendar date of `instant` in this timezone
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.0).date_naive()
    }

    /// Gets the start of day (00:00:00) in this timezone as UTC
    ///
    /// When midnight is ambiguous the earlier instant is used. When midnight
    /// falls in a DST gap the day starts at the first instant after the gap.
    pub fn start_of_day(&self, date: NaiveDate) -> Result<DateTime<Utc>, TemporalError> {
        let nonexistent = || TemporalError::NonexistentLocalTime {
            date,
            timezone: self.0.name().to_string(),
        };
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(nonexistent)?;

        if let Some(local) = midnight.and_local_timezone(self.0).earliest() {
            return Ok(local.with_timezone(&Utc));
        }

        // Midnight read with the offset in force before the gap is the
        // instant the clocks jumped forward
        let offset_before = self
            .0
            .offset_from_local_datetime(&(midnight - Duration::days(1)))
            .earliest()
            .ok_or_else(nonexistent)?
            .fix();
        offset_before
            .from_local_datetime(&midnight)
            .single()
            .map(|instant| instant.with_timezone(&Utc))
            .ok_or_else(nonexistent)
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name())
    }
}

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid period: start {start} must be before end {end}")]
    InvalidPeriod {
        start: String,
        end: String,
    },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Midnight of {date} does not exist in {timezone}")]
    NonexistentLocalTime {
        date: NaiveDate,
        timezone: String,
    },
}

/// A half-open interval `[start, end)` selecting invoices by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// First instant of the period (inclusive)
    pub start: DateTime<Utc>,
    /// First instant after the period (exclusive)
    pub end: DateTime<Utc>,
}

impl BillingPeriod {
    /// Creates a period, rejecting empty or inverted intervals
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TemporalError> {
        if start >= end {
            return Err(TemporalError::InvalidPeriod {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// The whole calendar month before the one containing `now`
    ///
    /// `start` is midnight on the first day of the previous month and `end`
    /// is midnight on the first day of the current month, both in `tz`.
    pub fn previous_month(now: DateTime<Utc>, tz: Timezone) -> Result<Self, TemporalError> {
        let today = tz.local_date(now);
        let first_of_month = today.with_day(1).ok_or_else(|| invalid_month(today))?;
        let first_of_previous = first_of_month
            .checked_sub_months(Months::new(1))
            .ok_or_else(|| invalid_month(today))?;

        Self::new(tz.start_of_day(first_of_previous)?, tz.start_of_day(first_of_month)?)
    }

    /// Returns true if `timestamp` falls inside the period
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

fn invalid_month(date: NaiveDate) -> TemporalError {
    TemporalError::InvalidPeriod {
        start: date.to_string(),
        end: date.to_string(),
    }
}
