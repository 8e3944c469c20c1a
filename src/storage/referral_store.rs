//! ReferralStore trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Result;
use crate::model::{Amount, ReferralReward, ReferralTracking, ReferrerTotals};

/// Summed tracking activity of one referrer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferrerActivity {
    pub user_id: String,
    pub referral_count: i64,
    pub total_donations: Amount,
    pub donation_count: i64,
}

/// Interface for referral persistence.
///
/// Tracking rows are updated with compare-and-swap on `version`; reward
/// grants are insert-if-absent on (tracking id, description).
///
/// Implementations:
/// - `SqliteReferralStore`: SQLite storage
/// - `MemoryStore`: in-memory
#[async_trait]
pub trait ReferralStore: Send + Sync {
    async fn get_tracking(&self, tracking_id: &str) -> Result<Option<ReferralTracking>>;

    /// Oldest pending row for `code` with no referred identity yet.
    async fn find_pending_click(&self, code: &str) -> Result<Option<ReferralTracking>>;

    /// Oldest row whose referred identity is `referred_id`.
    async fn find_by_referred(&self, referred_id: &str) -> Result<Option<ReferralTracking>>;

    async fn find_by_pair(
        &self,
        referrer_id: &str,
        referred_id: &str,
    ) -> Result<Option<ReferralTracking>>;

    /// Insert a new row.
    ///
    /// Fails with `Conflict` when a row for the same (referrer, referred)
    /// pair already exists.
    async fn insert_tracking(&self, tracking: &ReferralTracking) -> Result<()>;

    /// Store `tracking` if the stored version is still `tracking.version`.
    ///
    /// Returns the stored row with its bumped version, or `Conflict` when
    /// another writer got there first.
    async fn update_tracking(&self, tracking: &ReferralTracking) -> Result<ReferralTracking>;

    /// Rows where `referrer_id` is the referrer, newest first.
    async fn list_by_referrer(
        &self,
        referrer_id: &str,
        limit: Option<u64>,
    ) -> Result<Vec<ReferralTracking>>;

    /// Insert `reward` unless one with the same tracking id and description
    /// exists. Returns whether a row was inserted.
    async fn grant_reward(&self, reward: &ReferralReward) -> Result<bool>;

    async fn rewards_for_tracking(&self, tracking_id: &str) -> Result<Vec<ReferralReward>>;

    /// Rewards earned by `user_id`, most recently awarded first.
    async fn rewards_for_user(&self, user_id: &str) -> Result<Vec<ReferralReward>>;

    /// Atomically add to a referrer's counters, creating them if absent.
    async fn add_referrer_totals(
        &self,
        user_id: &str,
        referrals: i64,
        donations: Amount,
    ) -> Result<ReferrerTotals>;

    /// A referrer's counters, zero when none exist.
    async fn referrer_totals(&self, user_id: &str) -> Result<ReferrerTotals>;

    /// Referrers ranked by summed donations over their `donated` rows,
    /// optionally only rows whose first donation is at or after `since`.
    /// Ties are broken by user id ascending.
    async fn top_referrers(
        &self,
        since: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Vec<ReferrerActivity>>;
}
