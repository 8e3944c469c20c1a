//! Aggregate Updater.
//!
//! The single entry point for child/region counters and period summaries.
//! Incremental updates go through [`AggregateStore::apply`]; the resync
//! operations rebuild the same state from the ledger.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::config::RetryConfig;
use crate::model::{Amount, Donation, DonationSummary, PeriodKind, RunningTotal};
use crate::storage::{AggregateDelta, AggregateStore, DonationFilter, LedgerStore, Result};
use crate::utils::retry::retry_conflicts;

/// Keeps denormalized totals in step with the ledger.
pub struct AggregateUpdater {
    ledger: Arc<dyn LedgerStore>,
    aggregates: Arc<dyn AggregateStore>,
    /// Guest sentinel, never counted as a unique donor.
    ignored_donor: Option<String>,
    retry: RetryConfig,
}

impl AggregateUpdater {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        aggregates: Arc<dyn AggregateStore>,
        ignored_donor: Option<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            ledger,
            aggregates,
            ignored_donor,
            retry,
        }
    }

    /// Add a completed donation to the counters and summaries.
    ///
    /// Returns false when the donation was already applied (or reverted).
    pub async fn apply(&self, donation: &Donation, at: DateTime<Utc>) -> Result<bool> {
        let delta = AggregateDelta::apply(donation, self.ignored_donor.as_deref(), at);
        self.write(&delta).await
    }

    /// Take a donation's contribution back out.
    ///
    /// Returns false when there was nothing to undo.
    pub async fn revert(&self, donation: &Donation, at: DateTime<Utc>) -> Result<bool> {
        let delta = AggregateDelta::revert(donation, self.ignored_donor.as_deref(), at);
        self.write(&delta).await
    }

    async fn write(&self, delta: &AggregateDelta) -> Result<bool> {
        let aggregates = &self.aggregates;
        let changed = retry_conflicts(&self.retry, "aggregate apply", || async move {
            aggregates.apply(delta).await
        })
        .await?;

        debug!(
            donation = %delta.donation.id,
            direction = delta.direction.as_str(),
            changed,
            "Aggregate delta written"
        );
        Ok(changed)
    }

    /// Recompute a child's counter from its completed donations.
    pub async fn resync_child(&self, child_id: &str, now: DateTime<Utc>) -> Result<RunningTotal> {
        let totals = self
            .ledger
            .totals(&DonationFilter::completed().child(child_id))
            .await?;
        let total = RunningTotal {
            entity_id: child_id.to_string(),
            total_amount: totals.total_amount,
            donation_count: totals.donation_count,
            updated_at: now,
        };
        self.aggregates.set_child_total(&total).await?;

        info!(
            child = %child_id,
            total = %total.total_amount,
            count = total.donation_count,
            "Child total resynced"
        );
        Ok(total)
    }

    /// Recompute a region's counter from its completed donations.
    pub async fn resync_region(&self, region_id: &str, now: DateTime<Utc>) -> Result<RunningTotal> {
        let totals = self
            .ledger
            .totals(&DonationFilter::completed().region(region_id))
            .await?;
        let total = RunningTotal {
            entity_id: region_id.to_string(),
            total_amount: totals.total_amount,
            donation_count: totals.donation_count,
            updated_at: now,
        };
        self.aggregates.set_region_total(&total).await?;

        info!(
            region = %region_id,
            total = %total.total_amount,
            count = total.donation_count,
            "Region total resynced"
        );
        Ok(total)
    }

    /// Rebuild every summary row of a region from the ledger.
    ///
    /// Buckets with no completed donations are dropped.
    pub async fn rebuild_region_summaries(
        &self,
        region_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<DonationSummary>> {
        let filter = DonationFilter::completed()
            .region(region_id)
            .ignoring_donor(self.ignored_donor.as_deref());
        let donations = self.ledger.list(&filter).await?;

        let mut buckets: BTreeMap<(PeriodKind, NaiveDate), Bucket> = BTreeMap::new();
        for donation in &donations {
            for period in PeriodKind::ALL {
                let bucket = buckets
                    .entry((period, period.bucket_for(donation.created_at)))
                    .or_default();
                bucket.total = bucket.total + donation.amount;
                bucket.count += 1;
                if let Some(donor) = filter.counted_donor(donation) {
                    bucket.donors.insert(donor.to_string());
                }
            }
        }

        let rows: Vec<DonationSummary> = buckets
            .into_iter()
            .map(|((period, bucket_date), bucket)| DonationSummary {
                region_id: region_id.to_string(),
                period,
                bucket_date,
                total_amount: bucket.total,
                donation_count: bucket.count,
                unique_donors: bucket.donors.len() as i64,
                updated_at: now,
            })
            .collect();

        self.aggregates
            .replace_region_summaries(region_id, &rows)
            .await?;

        info!(
            region = %region_id,
            donations = donations.len(),
            rows = rows.len(),
            "Region summaries rebuilt"
        );
        Ok(rows)
    }
}

#[derive(Default)]
struct Bucket {
    total: Amount,
    count: i64,
    donors: HashSet<String>,
}
