//! AggregateStore trait definition.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::Result;
use crate::model::{Donation, DonationSummary, PeriodKind, RunningTotal};

/// Whether a donation's contribution is being added or taken back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Apply,
    Revert,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Apply => "apply",
            Direction::Revert => "revert",
        }
    }

    /// Sign applied to amounts and counts.
    pub fn sign(&self) -> i64 {
        match self {
            Direction::Apply => 1,
            Direction::Revert => -1,
        }
    }
}

/// One donation's effect on the running totals and summaries.
#[derive(Debug, Clone)]
pub struct AggregateDelta {
    pub donation: Donation,
    pub direction: Direction,
    /// Donor identity excluded from unique-donor counts.
    pub ignored_donor: Option<String>,
    pub at: DateTime<Utc>,
}

impl AggregateDelta {
    pub fn apply(donation: &Donation, ignored_donor: Option<&str>, at: DateTime<Utc>) -> Self {
        Self::new(donation, Direction::Apply, ignored_donor, at)
    }

    pub fn revert(donation: &Donation, ignored_donor: Option<&str>, at: DateTime<Utc>) -> Self {
        Self::new(donation, Direction::Revert, ignored_donor, at)
    }

    fn new(
        donation: &Donation,
        direction: Direction,
        ignored_donor: Option<&str>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            donation: donation.clone(),
            direction,
            ignored_donor: ignored_donor.map(str::to_string),
            at,
        }
    }

    /// Amount delta in minor units, signed by direction.
    pub fn signed_minor_units(&self) -> i64 {
        self.donation.amount.minor_units() * self.direction.sign()
    }

    /// The (period, bucket) rows this donation touches.
    pub fn buckets(&self) -> impl Iterator<Item = (PeriodKind, NaiveDate)> + '_ {
        PeriodKind::ALL
            .into_iter()
            .map(|period| (period, period.bucket_for(self.donation.created_at)))
    }
}

/// Interface for denormalized donation aggregates.
///
/// Every change goes through [`AggregateStore::apply`], which writes the
/// counters, the summary rows and an application marker in one atomic unit.
///
/// Implementations:
/// - `SqliteAggregateStore`: SQLite storage
/// - `MemoryStore`: in-memory
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Apply or revert one donation.
    ///
    /// Idempotent per (donation, direction): returns false and changes
    /// nothing when the delta was already applied, when an apply arrives
    /// after a revert, or when a revert has nothing to undo.
    async fn apply(&self, delta: &AggregateDelta) -> Result<bool>;

    async fn child_total(&self, child_id: &str) -> Result<Option<RunningTotal>>;

    async fn region_total(&self, region_id: &str) -> Result<Option<RunningTotal>>;

    /// Overwrite a child's counter, used by reconciliation.
    async fn set_child_total(&self, total: &RunningTotal) -> Result<()>;

    /// Overwrite a region's counter, used by reconciliation.
    async fn set_region_total(&self, total: &RunningTotal) -> Result<()>;

    async fn summary(
        &self,
        region_id: &str,
        period: PeriodKind,
        bucket_date: NaiveDate,
    ) -> Result<Option<DonationSummary>>;

    /// Summaries of every region for `period`, optionally one bucket only,
    /// ordered by total descending then region id.
    async fn summaries(
        &self,
        period: PeriodKind,
        bucket_date: Option<NaiveDate>,
    ) -> Result<Vec<DonationSummary>>;

    /// Every summary row of one region.
    async fn region_summaries(&self, region_id: &str) -> Result<Vec<DonationSummary>>;

    /// Atomically replace every summary row of one region.
    async fn replace_region_summaries(
        &self,
        region_id: &str,
        rows: &[DonationSummary],
    ) -> Result<()>;
}
