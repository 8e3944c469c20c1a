use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;

use super::MemoryStore;
use crate::model::{Amount, Donation, DonationStatus, GroupTotal, Totals};
use crate::storage::{DonationFilter, GroupBy, LedgerStore, Result, StorageError};

fn newest_first(a: &Donation, b: &Donation) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert(&self, donation: &Donation) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.donations.contains_key(&donation.id) {
            return Err(StorageError::Conflict(format!(
                "donation {} already exists",
                donation.id
            )));
        }
        tables
            .donations
            .insert(donation.id.clone(), donation.clone());
        Ok(())
    }

    async fn get(&self, donation_id: &str) -> Result<Option<Donation>> {
        Ok(self.tables.read().await.donations.get(donation_id).cloned())
    }

    async fn transition_status(
        &self,
        donation_id: &str,
        from: DonationStatus,
        to: DonationStatus,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.donations.get_mut(donation_id) {
            Some(donation) if donation.status == from => {
                donation.status = to;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StorageError::NotFound {
                entity: "donation",
                id: donation_id.to_string(),
            }),
        }
    }

    async fn list(&self, filter: &DonationFilter) -> Result<Vec<Donation>> {
        let tables = self.tables.read().await;
        let mut donations: Vec<Donation> = tables
            .donations
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        donations.sort_by(newest_first);
        if let Some(limit) = filter.limit {
            donations.truncate(limit as usize);
        }
        Ok(donations)
    }

    async fn totals(&self, filter: &DonationFilter) -> Result<Totals> {
        let tables = self.tables.read().await;
        let mut totals = Totals::default();
        let mut donors = HashSet::new();

        for donation in tables.donations.values().filter(|d| filter.matches(d)) {
            totals.total_amount = totals.total_amount + donation.amount;
            totals.donation_count += 1;
            if let Some(donor) = filter.counted_donor(donation) {
                donors.insert(donor.to_string());
            }
        }
        totals.unique_donors = donors.len() as i64;
        Ok(totals)
    }

    async fn group_totals(
        &self,
        group_by: GroupBy,
        filter: &DonationFilter,
    ) -> Result<Vec<GroupTotal>> {
        let tables = self.tables.read().await;
        let mut groups: BTreeMap<String, (Amount, i64)> = BTreeMap::new();

        for donation in tables.donations.values().filter(|d| filter.matches(d)) {
            let key = match group_by {
                GroupBy::Donor => filter.counted_donor(donation),
                GroupBy::Region => donation.region_id.as_deref(),
                GroupBy::Child => donation.child_id.as_deref(),
            };
            if let Some(key) = key {
                let entry = groups.entry(key.to_string()).or_insert((Amount::ZERO, 0));
                entry.0 = entry.0 + donation.amount;
                entry.1 += 1;
            }
        }

        let mut rows: Vec<GroupTotal> = groups
            .into_iter()
            .map(|(entity_id, (total_amount, donation_count))| GroupTotal {
                entity_id,
                total_amount,
                donation_count,
            })
            .collect();
        // BTreeMap iteration is already id-ascending; a stable sort keeps it for ties.
        rows.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
        if let Some(limit) = filter.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }
}
