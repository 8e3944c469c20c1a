use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{MemoryStore, Tables};
use crate::model::{
    Amount, Donation, DonationStatus, DonationSummary, PeriodKind, RunningTotal, Window,
};
use crate::storage::{AggregateDelta, AggregateStore, Direction, Result};

fn bump(
    totals: &mut HashMap<String, RunningTotal>,
    entity_id: &str,
    delta: &AggregateDelta,
) {
    let total = totals
        .entry(entity_id.to_string())
        .or_insert_with(|| RunningTotal {
            entity_id: entity_id.to_string(),
            total_amount: Amount::ZERO,
            donation_count: 0,
            updated_at: delta.at,
        });
    total.total_amount =
        Amount::from_minor_units(total.total_amount.minor_units() + delta.signed_minor_units());
    total.donation_count = (total.donation_count + delta.direction.sign()).max(0);
    total.updated_at = delta.at;
}

fn unique_donors(
    donations: &HashMap<String, Donation>,
    region_id: &str,
    window: Window,
    ignored_donor: Option<&str>,
) -> i64 {
    donations
        .values()
        .filter(|d| d.status == DonationStatus::Completed)
        .filter(|d| d.region_id.as_deref() == Some(region_id))
        .filter(|d| window.contains(d.created_at))
        .filter_map(|d| d.donor_id.as_deref())
        .filter(|donor| Some(*donor) != ignored_donor)
        .collect::<HashSet<_>>()
        .len() as i64
}

fn empty_summary(
    region_id: &str,
    period: PeriodKind,
    bucket_date: NaiveDate,
    at: DateTime<Utc>,
) -> DonationSummary {
    DonationSummary {
        region_id: region_id.to_string(),
        period,
        bucket_date,
        total_amount: Amount::ZERO,
        donation_count: 0,
        unique_donors: 0,
        updated_at: at,
    }
}

fn sort_summaries(rows: &mut [DonationSummary]) {
    rows.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.region_id.cmp(&b.region_id))
            .then_with(|| a.period.cmp(&b.period))
            .then_with(|| b.bucket_date.cmp(&a.bucket_date))
    });
}

impl Tables {
    fn should_apply(&self, donation_id: &str, direction: Direction) -> bool {
        let has = |d: Direction| self.applications.contains(&(donation_id.to_string(), d));
        match direction {
            Direction::Apply => !has(Direction::Apply) && !has(Direction::Revert),
            Direction::Revert => has(Direction::Apply) && !has(Direction::Revert),
        }
    }
}

#[async_trait]
impl AggregateStore for MemoryStore {
    async fn apply(&self, delta: &AggregateDelta) -> Result<bool> {
        Self::take_failure(&self.aggregate_failures, "aggregate write").await?;
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let donation = &delta.donation;

        if !tables.should_apply(&donation.id, delta.direction) {
            return Ok(false);
        }

        if let Some(child_id) = &donation.child_id {
            bump(&mut tables.child_totals, child_id, delta);
        }

        if let Some(region_id) = &donation.region_id {
            bump(&mut tables.region_totals, region_id, delta);

            for (period, bucket) in delta.buckets() {
                let unique = unique_donors(
                    &tables.donations,
                    region_id,
                    period.window(bucket),
                    delta.ignored_donor.as_deref(),
                );
                let row = tables
                    .summaries
                    .entry((region_id.clone(), period, bucket))
                    .or_insert_with(|| empty_summary(region_id, period, bucket, delta.at));
                row.total_amount = Amount::from_minor_units(
                    row.total_amount.minor_units() + delta.signed_minor_units(),
                );
                row.donation_count = (row.donation_count + delta.direction.sign()).max(0);
                row.unique_donors = unique;
                row.updated_at = delta.at;
            }
        }

        tables
            .applications
            .insert((donation.id.clone(), delta.direction));
        Ok(true)
    }

    async fn child_total(&self, child_id: &str) -> Result<Option<RunningTotal>> {
        Ok(self.tables.read().await.child_totals.get(child_id).cloned())
    }

    async fn region_total(&self, region_id: &str) -> Result<Option<RunningTotal>> {
        Ok(self.tables.read().await.region_totals.get(region_id).cloned())
    }

    async fn set_child_total(&self, total: &RunningTotal) -> Result<()> {
        self.tables
            .write()
            .await
            .child_totals
            .insert(total.entity_id.clone(), total.clone());
        Ok(())
    }

    async fn set_region_total(&self, total: &RunningTotal) -> Result<()> {
        self.tables
            .write()
            .await
            .region_totals
            .insert(total.entity_id.clone(), total.clone());
        Ok(())
    }

    async fn summary(
        &self,
        region_id: &str,
        period: PeriodKind,
        bucket_date: NaiveDate,
    ) -> Result<Option<DonationSummary>> {
        let key = (region_id.to_string(), period, bucket_date);
        Ok(self.tables.read().await.summaries.get(&key).cloned())
    }

    async fn summaries(
        &self,
        period: PeriodKind,
        bucket_date: Option<NaiveDate>,
    ) -> Result<Vec<DonationSummary>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<DonationSummary> = tables
            .summaries
            .values()
            .filter(|s| s.period == period)
            .filter(|s| bucket_date.map_or(true, |date| s.bucket_date == date))
            .cloned()
            .collect();
        sort_summaries(&mut rows);
        Ok(rows)
    }

    async fn region_summaries(&self, region_id: &str) -> Result<Vec<DonationSummary>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<DonationSummary> = tables
            .summaries
            .values()
            .filter(|s| s.region_id == region_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.period
                .cmp(&b.period)
                .then_with(|| b.bucket_date.cmp(&a.bucket_date))
        });
        Ok(rows)
    }

    async fn replace_region_summaries(
        &self,
        region_id: &str,
        rows: &[DonationSummary],
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.summaries.retain(|(region, _, _), _| region != region_id);
        for row in rows {
            tables.summaries.insert(
                (row.region_id.clone(), row.period, row.bucket_date),
                row.clone(),
            );
        }
        Ok(())
    }
}
