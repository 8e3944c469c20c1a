//! Leaderboard snapshots.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, ParseEnumError, PeriodKind};

/// What a leaderboard ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKind {
    Donor,
    Region,
    School,
}

impl LeaderboardKind {
    pub const ALL: [LeaderboardKind; 3] = [
        LeaderboardKind::Donor,
        LeaderboardKind::Region,
        LeaderboardKind::School,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardKind::Donor => "donor",
            LeaderboardKind::Region => "region",
            LeaderboardKind::School => "school",
        }
    }
}

impl fmt::Display for LeaderboardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaderboardKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donor" => Ok(LeaderboardKind::Donor),
            "region" => Ok(LeaderboardKind::Region),
            "school" => Ok(LeaderboardKind::School),
            other => Err(ParseEnumError::new("leaderboard kind", other)),
        }
    }
}

/// Identifies one snapshot: a kind, a period granularity and a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeaderboardKey {
    pub kind: LeaderboardKind,
    pub period: PeriodKind,
    pub bucket_date: NaiveDate,
}

impl LeaderboardKey {
    pub fn new(kind: LeaderboardKind, period: PeriodKind, bucket_date: NaiveDate) -> Self {
        Self {
            kind,
            period,
            bucket_date: period.bucket_date(bucket_date),
        }
    }

    /// Snapshot key for the bucket immediately before this one.
    pub fn previous(&self) -> Option<LeaderboardKey> {
        self.period
            .previous_bucket(self.bucket_date)
            .map(|bucket_date| LeaderboardKey { bucket_date, ..*self })
    }
}

impl fmt::Display for LeaderboardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.period, self.bucket_date)
    }
}

/// A ranked entity inside one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub kind: LeaderboardKind,
    pub period: PeriodKind,
    pub bucket_date: NaiveDate,
    pub entity_id: String,
    pub entity_name: Option<String>,
    /// 1-based position.
    pub rank: i64,
    /// Previous-bucket rank minus this rank. Positive means climbing.
    pub rank_change: i64,
    pub total_amount: Amount,
    pub donation_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl LeaderboardEntry {
    pub fn key(&self) -> LeaderboardKey {
        LeaderboardKey {
            kind: self.kind,
            period: self.period,
            bucket_date: self.bucket_date,
        }
    }
}

/// A page of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leaderboard {
    pub kind: LeaderboardKind,
    pub period: PeriodKind,
    pub bucket_date: NaiveDate,
    pub total_entries: i64,
    pub entries: Vec<LeaderboardEntry>,
}
