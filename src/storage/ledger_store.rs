//! LedgerStore trait definition.

use async_trait::async_trait;

use super::Result;
use crate::model::{Donation, DonationStatus, GroupTotal, Totals, Window};

/// Row selection shared by ledger queries. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DonationFilter {
    pub donor_id: Option<String>,
    pub child_id: Option<String>,
    pub region_id: Option<String>,
    pub referral_code: Option<String>,
    pub status: Option<DonationStatus>,
    /// `created_at` must fall inside this window.
    pub window: Window,
    /// Donor identity that never counts as a donor (the guest sentinel).
    /// Rows are still returned and summed; they are only left out of
    /// distinct-donor counts and donor grouping.
    pub ignored_donor: Option<String>,
    pub limit: Option<u64>,
}

impl DonationFilter {
    /// Completed donations only.
    pub fn completed() -> Self {
        Self {
            status: Some(DonationStatus::Completed),
            ..Self::default()
        }
    }

    pub fn donor(mut self, donor_id: &str) -> Self {
        self.donor_id = Some(donor_id.to_string());
        self
    }

    pub fn child(mut self, child_id: &str) -> Self {
        self.child_id = Some(child_id.to_string());
        self
    }

    pub fn region(mut self, region_id: &str) -> Self {
        self.region_id = Some(region_id.to_string());
        self
    }

    pub fn referral_code(mut self, code: &str) -> Self {
        self.referral_code = Some(code.to_string());
        self
    }

    pub fn within(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    pub fn ignoring_donor(mut self, donor_id: Option<&str>) -> Self {
        self.ignored_donor = donor_id.map(str::to_string);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `donation` is selected, ignoring `limit`.
    pub fn matches(&self, donation: &Donation) -> bool {
        fn eq(want: &Option<String>, have: &Option<String>) -> bool {
            want.is_none() || want == have
        }

        eq(&self.donor_id, &donation.donor_id)
            && eq(&self.child_id, &donation.child_id)
            && eq(&self.region_id, &donation.region_id)
            && eq(&self.referral_code, &donation.referral_code)
            && self.status.map_or(true, |status| status == donation.status)
            && self.window.contains(donation.created_at)
    }

    /// The donor identity of `donation` if it counts as a real donor.
    pub fn counted_donor<'a>(&self, donation: &'a Donation) -> Option<&'a str> {
        donation
            .donor_id
            .as_deref()
            .filter(|donor| self.ignored_donor.as_deref() != Some(*donor))
    }
}

/// Dimension of a ledger group-by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupBy {
    Donor,
    Region,
    Child,
}

/// Interface for the donation ledger.
///
/// Records are immutable apart from `status`, which only moves through
/// [`LedgerStore::transition_status`].
///
/// Implementations:
/// - `SqliteLedgerStore`: SQLite storage
/// - `MemoryStore`: in-memory
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a new donation.
    async fn insert(&self, donation: &Donation) -> Result<()>;

    /// Fetch a donation by id.
    async fn get(&self, donation_id: &str) -> Result<Option<Donation>>;

    /// Compare-and-swap the status of a donation.
    ///
    /// Returns false when the stored status is not `from`.
    async fn transition_status(
        &self,
        donation_id: &str,
        from: DonationStatus,
        to: DonationStatus,
    ) -> Result<bool>;

    /// Selected donations, newest first.
    async fn list(&self, filter: &DonationFilter) -> Result<Vec<Donation>>;

    /// Sum, count and distinct real donors over the selected donations.
    async fn totals(&self, filter: &DonationFilter) -> Result<Totals>;

    /// Selected donations grouped by `group_by`, rows without a group key
    /// dropped, ordered by total descending then entity id ascending.
    async fn group_totals(&self, group_by: GroupBy, filter: &DonationFilter)
        -> Result<Vec<GroupTotal>>;
}
