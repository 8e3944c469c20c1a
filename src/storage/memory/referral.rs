use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MemoryStore;
use crate::model::{
    Amount, ReferralReward, ReferralStatus, ReferralTracking, ReferrerTotals,
};
use crate::storage::{ReferralStore, ReferrerActivity, Result, StorageError};

fn oldest<'a>(rows: impl Iterator<Item = &'a ReferralTracking>) -> Option<ReferralTracking> {
    rows.min_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    })
    .cloned()
}

fn same_pair(a: &ReferralTracking, b: &ReferralTracking) -> bool {
    a.id != b.id
        && a.referred_id.is_some()
        && a.referrer_id == b.referrer_id
        && a.referred_id == b.referred_id
}

#[async_trait]
impl ReferralStore for MemoryStore {
    async fn get_tracking(&self, tracking_id: &str) -> Result<Option<ReferralTracking>> {
        Ok(self.tables.read().await.tracking.get(tracking_id).cloned())
    }

    async fn find_pending_click(&self, code: &str) -> Result<Option<ReferralTracking>> {
        let tables = self.tables.read().await;
        Ok(oldest(tables.tracking.values().filter(|t| {
            t.referral_code == code
                && t.status == ReferralStatus::Pending
                && t.referred_id.is_none()
        })))
    }

    async fn find_by_referred(&self, referred_id: &str) -> Result<Option<ReferralTracking>> {
        let tables = self.tables.read().await;
        Ok(oldest(
            tables
                .tracking
                .values()
                .filter(|t| t.referred_id.as_deref() == Some(referred_id)),
        ))
    }

    async fn find_by_pair(
        &self,
        referrer_id: &str,
        referred_id: &str,
    ) -> Result<Option<ReferralTracking>> {
        let tables = self.tables.read().await;
        Ok(oldest(tables.tracking.values().filter(|t| {
            t.referrer_id == referrer_id && t.referred_id.as_deref() == Some(referred_id)
        })))
    }

    async fn insert_tracking(&self, tracking: &ReferralTracking) -> Result<()> {
        self.check_referral_writes().await?;
        let mut tables = self.tables.write().await;
        if tables.tracking.contains_key(&tracking.id)
            || tables.tracking.values().any(|t| same_pair(tracking, t))
        {
            return Err(StorageError::Conflict(format!(
                "referral {} -> {:?} already tracked",
                tracking.referrer_id, tracking.referred_id
            )));
        }
        tables
            .tracking
            .insert(tracking.id.clone(), tracking.clone());
        Ok(())
    }

    async fn update_tracking(&self, tracking: &ReferralTracking) -> Result<ReferralTracking> {
        self.check_referral_writes().await?;
        {
            let mut pending = self.tracking_conflicts.write().await;
            if *pending > 0 {
                *pending -= 1;
                return Err(StorageError::Conflict(format!(
                    "injected conflict on referral {}",
                    tracking.id
                )));
            }
        }

        let mut tables = self.tables.write().await;
        let stored_version = tables
            .tracking
            .get(&tracking.id)
            .map(|t| t.version)
            .ok_or_else(|| StorageError::NotFound {
                entity: "referral tracking",
                id: tracking.id.clone(),
            })?;
        if stored_version != tracking.version {
            return Err(StorageError::Conflict(format!(
                "referral {} is at version {}, expected {}",
                tracking.id, stored_version, tracking.version
            )));
        }
        if tables.tracking.values().any(|t| same_pair(tracking, t)) {
            return Err(StorageError::Conflict(format!(
                "referral {} -> {:?} already tracked",
                tracking.referrer_id, tracking.referred_id
            )));
        }

        let mut updated = tracking.clone();
        updated.version += 1;
        tables.tracking.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    async fn list_by_referrer(
        &self,
        referrer_id: &str,
        limit: Option<u64>,
    ) -> Result<Vec<ReferralTracking>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ReferralTracking> = tables
            .tracking
            .values()
            .filter(|t| t.referrer_id == referrer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(limit) = limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn grant_reward(&self, reward: &ReferralReward) -> Result<bool> {
        self.check_referral_writes().await?;
        Self::take_failure(&self.reward_failures, "reward grant").await?;
        let mut tables = self.tables.write().await;
        let exists = tables.rewards.iter().any(|r| {
            r.tracking_id == reward.tracking_id && r.description == reward.description
        });
        if exists {
            return Ok(false);
        }
        tables.rewards.push(reward.clone());
        Ok(true)
    }

    async fn rewards_for_tracking(&self, tracking_id: &str) -> Result<Vec<ReferralReward>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rewards
            .iter()
            .filter(|r| r.tracking_id == tracking_id)
            .cloned()
            .collect())
    }

    async fn rewards_for_user(&self, user_id: &str) -> Result<Vec<ReferralReward>> {
        let tables = self.tables.read().await;
        let mut rewards: Vec<ReferralReward> = tables
            .rewards
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        // Vec order is insertion order; reverse first so equal timestamps
        // still list the latest grant first.
        rewards.reverse();
        rewards.sort_by(|a, b| b.awarded_at.cmp(&a.awarded_at));
        Ok(rewards)
    }

    async fn add_referrer_totals(
        &self,
        user_id: &str,
        referrals: i64,
        donations: Amount,
    ) -> Result<ReferrerTotals> {
        self.check_referral_writes().await?;
        let mut tables = self.tables.write().await;
        let totals = tables
            .referrer_totals
            .entry(user_id.to_string())
            .or_insert_with(|| ReferrerTotals {
                user_id: user_id.to_string(),
                ..ReferrerTotals::default()
            });
        totals.referral_count += referrals;
        totals.referral_donations_total = totals.referral_donations_total + donations;
        Ok(totals.clone())
    }

    async fn referrer_totals(&self, user_id: &str) -> Result<ReferrerTotals> {
        let tables = self.tables.read().await;
        Ok(tables
            .referrer_totals
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| ReferrerTotals {
                user_id: user_id.to_string(),
                ..ReferrerTotals::default()
            }))
    }

    async fn top_referrers(
        &self,
        since: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Vec<ReferrerActivity>> {
        let tables = self.tables.read().await;
        let mut groups: BTreeMap<String, ReferrerActivity> = BTreeMap::new();

        let rows = tables.tracking.values().filter(|t| {
            t.status == ReferralStatus::Donated
                && since.map_or(true, |since| {
                    t.first_donation_at.is_some_and(|first| first >= since)
                })
        });
        for tracking in rows {
            let activity = groups
                .entry(tracking.referrer_id.clone())
                .or_insert_with(|| ReferrerActivity {
                    user_id: tracking.referrer_id.clone(),
                    referral_count: 0,
                    total_donations: Amount::ZERO,
                    donation_count: 0,
                });
            activity.referral_count += 1;
            activity.total_donations = activity.total_donations + tracking.total_donations;
            activity.donation_count += tracking.donation_count;
        }

        let mut ranked: Vec<ReferrerActivity> = groups.into_values().collect();
        ranked.sort_by(|a, b| b.total_donations.cmp(&a.total_donations));
        ranked.truncate(limit as usize);
        Ok(ranked)
    }
}
