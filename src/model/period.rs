//! Period buckets used by summaries and leaderboards.
//!
//! Buckets of one kind partition time without gaps or overlaps:
//! - daily: the calendar day
//! - weekly: anchored on Monday
//! - monthly: anchored on the 1st
//! - yearly: anchored on January 1st
//! - all-time: a single bucket dated [`all_time_bucket`]
//!
//! All dates are UTC calendar dates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Bucket date of the single all-time bucket.
pub fn all_time_bucket() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

/// Summary / leaderboard period granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    AllTime,
}

impl PeriodKind {
    pub const ALL: [PeriodKind; 5] = [
        PeriodKind::Daily,
        PeriodKind::Weekly,
        PeriodKind::Monthly,
        PeriodKind::Yearly,
        PeriodKind::AllTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodKind::Daily => "daily",
            PeriodKind::Weekly => "weekly",
            PeriodKind::Monthly => "monthly",
            PeriodKind::Yearly => "yearly",
            PeriodKind::AllTime => "all_time",
        }
    }

    /// Bucket date containing `date`.
    pub fn bucket_date(&self, date: NaiveDate) -> NaiveDate {
        match self {
            PeriodKind::Daily => date,
            PeriodKind::Weekly => {
                date - Days::new(u64::from(date.weekday().num_days_from_monday()))
            }
            PeriodKind::Monthly => date.with_day(1).unwrap_or(date),
            PeriodKind::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
            PeriodKind::AllTime => all_time_bucket(),
        }
    }

    /// Bucket date containing the instant `at`.
    pub fn bucket_for(&self, at: DateTime<Utc>) -> NaiveDate {
        self.bucket_date(at.date_naive())
    }

    /// The bucket immediately after `bucket`. `None` for all-time.
    pub fn next_bucket(&self, bucket: NaiveDate) -> Option<NaiveDate> {
        match self {
            PeriodKind::Daily => bucket.checked_add_days(Days::new(1)),
            PeriodKind::Weekly => bucket.checked_add_days(Days::new(7)),
            PeriodKind::Monthly => bucket.checked_add_months(Months::new(1)),
            PeriodKind::Yearly => bucket.checked_add_months(Months::new(12)),
            PeriodKind::AllTime => None,
        }
    }

    /// The bucket immediately before `bucket`. `None` for all-time.
    pub fn previous_bucket(&self, bucket: NaiveDate) -> Option<NaiveDate> {
        match self {
            PeriodKind::Daily => bucket.checked_sub_days(Days::new(1)),
            PeriodKind::Weekly => bucket.checked_sub_days(Days::new(7)),
            PeriodKind::Monthly => bucket.checked_sub_months(Months::new(1)),
            PeriodKind::Yearly => bucket.checked_sub_months(Months::new(12)),
            PeriodKind::AllTime => None,
        }
    }

    /// Time window covered by `bucket`. All-time is unbounded.
    pub fn window(&self, bucket: NaiveDate) -> Window {
        match self {
            PeriodKind::AllTime => Window::unbounded(),
            _ => Window {
                start: Some(start_of_day(bucket)),
                end: self.next_bucket(bucket).map(start_of_day),
            },
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(PeriodKind::Daily),
            "weekly" => Ok(PeriodKind::Weekly),
            "monthly" => Ok(PeriodKind::Monthly),
            "yearly" => Ok(PeriodKind::Yearly),
            "all_time" => Ok(PeriodKind::AllTime),
            other => Err(ParseEnumError::new("period", other)),
        }
    }
}

/// Half-open time window `[start, end)`. Missing bounds are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Window {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| at >= start) && self.end.map_or(true, |end| at < end)
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
