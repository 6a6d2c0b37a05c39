//! Time types for appointments and availability.
//!
//! This module provides [`TimeInterval`], a validated half-open range of UTC
//! instants, and [`BusinessHours`], the daily opening window of the business
//! expressed in a local timezone.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A half-open time range `[start, end)` in UTC.
///
/// The constructor guarantees `start < end`; values are immutable once built.
/// Back-to-back intervals (one ending exactly where the other starts) do not
/// overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct TimeInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawInterval> for TimeInterval {
    type Error = DomainError;

    fn try_from(raw: RawInterval) -> DomainResult<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl TimeInterval {
    /// Creates a new interval.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidInterval`] unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if start >= end {
            return Err(DomainError::InvalidInterval {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Creates an interval from a start instant and a length.
    pub fn from_duration(start: DateTime<Utc>, duration: Duration) -> DomainResult<Self> {
        Self::new(start, start + duration)
    }

    /// Creates the interval covering one local calendar day in `tz`.
    pub fn for_date<Tz2: TimeZone>(date: NaiveDate, tz: &Tz2) -> DomainResult<Self> {
        Self::for_days(date, 1, tz)
    }

    /// Creates the interval covering seven local days starting at `date`.
    pub fn week_from<Tz2: TimeZone>(date: NaiveDate, tz: &Tz2) -> DomainResult<Self> {
        Self::for_days(date, 7, tz)
    }

    fn for_days<Tz2: TimeZone>(date: NaiveDate, days: u64, tz: &Tz2) -> DomainResult<Self> {
        let last = date
            .checked_add_days(chrono::Days::new(days))
            .ok_or_else(|| DomainError::validation("date", "date out of range"))?;
        let start = local_to_utc(tz, date.and_time(NaiveTime::MIN))?;
        let end = local_to_utc(tz, last.and_time(NaiveTime::MIN))?;
        Self::new(start, end)
    }

    /// Returns the inclusive start instant.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the exclusive end instant.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns the length of the interval. Always positive.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Strict half-open overlap test.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Overlap test that also accepts coinciding boundaries.
    pub fn touches_or_overlaps(&self, other: &TimeInterval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Checks if an instant falls within `[start, end)`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// True iff this interval lies inside `[open, close]`.
    pub fn within(&self, open: DateTime<Utc>, close: DateTime<Utc>) -> bool {
        self.start >= open && self.end <= close
    }

    /// Returns the intersection with `other`, if it is non-empty.
    pub fn clip(&self, other: &TimeInterval) -> Option<TimeInterval> {
        Self::new(self.start.max(other.start), self.end.min(other.end)).ok()
    }

    /// Returns a copy of this interval moved to start at `start`, keeping its length.
    pub fn moved_to(&self, start: DateTime<Utc>) -> TimeInterval {
        TimeInterval {
            start,
            end: start + self.duration(),
        }
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Strict half-open overlap: `a.start < b.end && b.start < a.end`.
pub fn overlaps(a: &TimeInterval, b: &TimeInterval) -> bool {
    a.overlaps(b)
}

/// Length of an interval.
pub fn duration(a: &TimeInterval) -> Duration {
    a.duration()
}

/// Daily opening hours of the business, in a local timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    open: NaiveTime,
    close: NaiveTime,
    timezone: Tz,
}

impl BusinessHours {
    /// Creates business hours from local opening and closing times.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidWindow`] if `open >= close`.
    pub fn new(open: NaiveTime, close: NaiveTime, timezone: Tz) -> DomainResult<Self> {
        if open >= close {
            return Err(DomainError::InvalidWindow {
                open: open.to_string(),
                close: close.to_string(),
            });
        }
        Ok(Self {
            open,
            close,
            timezone,
        })
    }

    /// Creates business hours from whole hours (24h clock).
    pub fn from_hours(open_hour: u32, close_hour: u32, timezone: Tz) -> DomainResult<Self> {
        let to_time = |hour: u32| {
            NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(|| {
                DomainError::validation("business_hours", format!("hour {} out of range", hour))
            })
        };
        Self::new(to_time(open_hour)?, to_time(close_hour)?, timezone)
    }

    /// Local opening time.
    pub fn open(&self) -> NaiveTime {
        self.open
    }

    /// Local closing time.
    pub fn close(&self) -> NaiveTime {
        self.close
    }

    /// Timezone the hours are expressed in.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Returns the opening hours of a local day as a UTC interval.
    pub fn window_on(&self, date: NaiveDate) -> DomainResult<TimeInterval> {
        let open = local_to_utc(&self.timezone, date.and_time(self.open))?;
        let close = local_to_utc(&self.timezone, date.and_time(self.close))?;
        TimeInterval::new(open, close).map_err(|_| DomainError::InvalidWindow {
            open: open.to_rfc3339(),
            close: close.to_rfc3339(),
        })
    }

    /// True iff `interval` lies inside the opening hours of the local day it starts on.
    pub fn contains(&self, interval: &TimeInterval) -> bool {
        let date = interval.start().with_timezone(&self.timezone).date_naive();
        match self.window_on(date) {
            Ok(window) => interval.within(window.start(), window.end()),
            Err(_) => false,
        }
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            timezone: Tz::America__Mexico_City,
        }
    }
}

/// Parses an IANA timezone identifier.
pub fn parse_timezone(name: &str) -> DomainResult<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| DomainError::InvalidTimezone(name.to_string()))
}

/// Parses a user-supplied instant.
///
/// Accepts RFC 3339 timestamps with an offset, or naive local date-times
/// (`2025-10-17T14:00[:00]` or `2025-10-17 14:00`) interpreted in `tz`.
pub fn parse_instant(text: &str, tz: &Tz) -> DomainResult<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| {
            DomainError::validation("time", format!("cannot parse '{}' as a date-time", text))
        })
        .and_then(|naive| local_to_utc(tz, naive))
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| {
        DomainError::validation("date", format!("cannot parse '{}' as YYYY-MM-DD", text))
    })
}

/// Resolves a local wall-clock time to UTC, taking the earlier instant on DST folds.
pub fn local_to_utc<Tz2: TimeZone>(tz: &Tz2, local: NaiveDateTime) -> DomainResult<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            DomainError::validation("time", format!("{} does not exist in this timezone", local))
        })
}
