//! In-memory storage.
//!
//! [`MemoryStore`] implements every store trait over one lock-protected set
//! of tables, so each trait method is atomic with respect to the others.
//! Used by the `memory` storage type and by tests, which can also inject
//! failures and write conflicts.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::{Direction, Result, StorageError};
use crate::model::{
    Donation, DonationSummary, LeaderboardEntry, LeaderboardKey, PeriodKind, ReferralReward,
    ReferralTracking, ReferrerTotals, RunningTotal,
};

mod aggregate;
mod leaderboard;
mod ledger;
mod referral;


type SummaryKey = (String, PeriodKind, chrono::NaiveDate);

#[derive(Default)]
struct Tables {
    donations: HashMap<String, Donation>,
    child_totals: HashMap<String, RunningTotal>,
    region_totals: HashMap<String, RunningTotal>,
    summaries: HashMap<SummaryKey, DonationSummary>,
    applications: HashSet<(String, Direction)>,
    tracking: HashMap<String, ReferralTracking>,
    rewards: Vec<ReferralReward>,
    referrer_totals: HashMap<String, ReferrerTotals>,
    leaderboards: HashMap<LeaderboardKey, Vec<LeaderboardEntry>>,
}

/// In-memory implementation of all store traits.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_referral_writes: RwLock<bool>,
    fail_leaderboard_writes: RwLock<bool>,
    tracking_conflicts: RwLock<u32>,
    reward_failures: RwLock<u32>,
    aggregate_failures: RwLock<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every referral write fail with `Unavailable`.
    pub async fn set_fail_referral_writes(&self, fail: bool) {
        *self.fail_referral_writes.write().await = fail;
    }

    /// Make every leaderboard snapshot replace fail with `Unavailable`.
    pub async fn set_fail_leaderboard_writes(&self, fail: bool) {
        *self.fail_leaderboard_writes.write().await = fail;
    }

    /// Fail the next `count` tracking updates with `Conflict`, as if another
    /// writer had bumped the version first.
    pub async fn inject_tracking_conflicts(&self, count: u32) {
        *self.tracking_conflicts.write().await = count;
    }

    /// Fail the next `count` reward grants with `Unavailable`.
    pub async fn fail_next_reward_grants(&self, count: u32) {
        *self.reward_failures.write().await = count;
    }

    /// Fail the next `count` aggregate applies or reverts with `Unavailable`.
    pub async fn fail_next_aggregate_writes(&self, count: u32) {
        *self.aggregate_failures.write().await = count;
    }

    pub async fn donation_count(&self) -> usize {
        self.tables.read().await.donations.len()
    }

    async fn check_referral_writes(&self) -> Result<()> {
        if *self.fail_referral_writes.read().await {
            return Err(StorageError::Unavailable(
                "referral writes disabled".to_string(),
            ));
        }
        Ok(())
    }

    async fn take_failure(counter: &RwLock<u32>, what: &str) -> Result<()> {
        let mut pending = counter.write().await;
        if *pending > 0 {
            *pending -= 1;
            return Err(StorageError::Unavailable(format!("injected {what} failure")));
        }
        Ok(())
    }
}
