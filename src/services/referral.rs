//! Referral Attribution Engine.
//!
//! Drives tracking rows through `pending -> registered -> donated` (with
//! `expired` terminal) and grants the one-shot rewards each transition
//! earns. Every tracking mutation is a compare-and-swap on the row version;
//! a lost race re-reads the row and tries the whole transition again.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::RetryConfig;
use crate::interfaces::{DirectoryError, ReferralCodeResolver};
use crate::model::{
    Amount, Applicability, Milestone, PeriodKind, ReferralReward, ReferralStats, ReferralStatus,
    ReferralTier, ReferralTracking, ReferrerLeaderboardEntry, ReferrerStats, RewardStats,
    RewardStatus, RewardTrigger, RewardType, TransitionError,
};
use crate::services::milestone::MilestoneEvaluator;
use crate::storage::{ReferralStore, StorageError};
use crate::utils::retry::retry_conflicts;

const RECENT_REFERRALS: usize = 5;
const LISTED_REWARDS: usize = 10;

/// Why a referral code earned nothing for a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The code does not resolve to a user.
    UnknownCode,
    /// The donor owns the code.
    SelfReferral,
    /// The donor is already tracked under another referrer.
    CrossReferrer,
    /// The donor's tracking row has expired.
    Expired,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::UnknownCode => "unknown_code",
            RejectReason::SelfReferral => "self_referral",
            RejectReason::CrossReferrer => "cross_referrer",
            RejectReason::Expired => "expired",
        }
    }
}

/// Result of attributing one donation to a referral code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributionOutcome {
    Attributed {
        tracking_id: String,
        /// This donation moved the row into `donated`.
        first_donation: bool,
        /// Reward rows newly written by this call.
        rewards_granted: usize,
    },
    Rejected(RejectReason),
}

/// Errors from the attribution engine.
#[derive(Debug, thiserror::Error)]
pub enum AttributionError {
    #[error("Unknown referral code: {0}")]
    UnknownCode(String),

    #[error("Users cannot use their own referral code")]
    SelfReferral,

    #[error("User {referred_id} was already referred by someone else")]
    CrossReferrer { referred_id: String },

    #[error("Referral tracking not found: {0}")]
    TrackingNotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Referral code resolution failed: {0}")]
    Resolver(#[from] DirectoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of a tracking-row transition, before rewards are granted.
enum Transition {
    Stored {
        tracking: ReferralTracking,
        changed: bool,
    },
    Rejected(RejectReason),
}

/// Referral tracking, rewards and referrer statistics.
pub struct AttributionEngine {
    referrals: Arc<dyn ReferralStore>,
    resolver: Arc<dyn ReferralCodeResolver>,
    retry: RetryConfig,
    badges: MilestoneEvaluator,
}

impl AttributionEngine {
    pub fn new(
        referrals: Arc<dyn ReferralStore>,
        resolver: Arc<dyn ReferralCodeResolver>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            referrals,
            resolver,
            retry,
            badges: MilestoneEvaluator::new(Milestone::referral_badges()),
        }
    }

    /// Credit a donation made with `code` to the code's owner.
    ///
    /// Unknown codes, self-referrals, donors tracked under another referrer
    /// and expired rows are rejected without writing anything.
    pub async fn attribute_donation(
        &self,
        code: &str,
        donor_id: Option<&str>,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<AttributionOutcome, AttributionError> {
        let Some(referrer_id) = self.resolver.resolve_referral_code(code).await? else {
            return Ok(AttributionOutcome::Rejected(RejectReason::UnknownCode));
        };
        if donor_id == Some(referrer_id.as_str()) {
            return Ok(AttributionOutcome::Rejected(RejectReason::SelfReferral));
        }

        let referrals = &self.referrals;
        let referrer = referrer_id.as_str();
        let transition = retry_conflicts(&self.retry, "referral donation", || async move {
            let Some(donor) = donor_id else {
                let row = ReferralTracking::from_donation(referrer, code, None, amount, now);
                referrals.insert_tracking(&row).await?;
                return Ok(Transition::Stored {
                    tracking: row,
                    changed: true,
                });
            };

            match referrals.find_by_referred(donor).await? {
                Some(row) if row.referrer_id != referrer => {
                    Ok(Transition::Rejected(RejectReason::CrossReferrer))
                }
                Some(mut row) => match row.record_donation(amount, now) {
                    Ok(first) => Ok(Transition::Stored {
                        tracking: referrals.update_tracking(&row).await?,
                        changed: first,
                    }),
                    Err(_) => Ok(Transition::Rejected(RejectReason::Expired)),
                },
                None => {
                    let row =
                        ReferralTracking::from_donation(referrer, code, Some(donor), amount, now);
                    referrals.insert_tracking(&row).await?;
                    Ok(Transition::Stored {
                        tracking: row,
                        changed: true,
                    })
                }
            }
        })
        .await?;

        let (tracking, first_donation) = match transition {
            Transition::Stored { tracking, changed } => (tracking, changed),
            Transition::Rejected(reason) => return Ok(AttributionOutcome::Rejected(reason)),
        };

        // Totals before grants; a grant lost here lands on the row's next donation.
        retry_conflicts(&self.retry, "referrer totals", || async move {
            referrals.add_referrer_totals(referrer, 0, amount).await
        })
        .await?;

        let mut rewards_granted = 0;
        if tracking.status == ReferralStatus::Donated
            && self
                .grant_trigger(&tracking, RewardTrigger::FirstDonation, now)
                .await?
        {
            rewards_granted += 1;
        }
        rewards_granted += self.grant_badges(&tracking, now).await?;

        info!(
            referrer = %referrer,
            tracking = %tracking.id,
            amount = %amount,
            first_donation,
            rewards_granted,
            "Donation attributed to referral"
        );
        Ok(AttributionOutcome::Attributed {
            tracking_id: tracking.id,
            first_donation,
            rewards_granted,
        })
    }

    /// Count a click on a shared link.
    ///
    /// Reuses the oldest unclaimed pending row for the code, else opens one.
    pub async fn track_click(
        &self,
        code: &str,
        source: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReferralTracking, AttributionError> {
        let referrer_id = self.resolve(code).await?;
        let referrals = &self.referrals;
        let referrer = referrer_id.as_str();

        let tracking = retry_conflicts(&self.retry, "referral click", || async move {
            match referrals.find_pending_click(code).await? {
                Some(mut row) => {
                    row.record_click(now);
                    referrals.update_tracking(&row).await
                }
                None => {
                    let row = ReferralTracking::from_click(referrer, code, source, now);
                    referrals.insert_tracking(&row).await?;
                    Ok(row)
                }
            }
        })
        .await?;

        debug!(
            code = %code,
            tracking = %tracking.id,
            clicks = tracking.click_count,
            "Referral click tracked"
        );
        Ok(tracking)
    }

    /// Attach a newly registered user to the code's owner.
    pub async fn register(
        &self,
        code: &str,
        referred_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReferralTracking, AttributionError> {
        let referrer_id = self.resolve(code).await?;
        if referrer_id == referred_id {
            return Err(AttributionError::SelfReferral);
        }

        let referrals = &self.referrals;
        let referrer = referrer_id.as_str();
        let (tracking, newly_claimed) =
            retry_conflicts(&self.retry, "referral registration", || async move {
                if let Some(existing) = referrals.find_by_referred(referred_id).await? {
                    if existing.referrer_id != referrer {
                        return Ok(Err(AttributionError::CrossReferrer {
                            referred_id: referred_id.to_string(),
                        }));
                    }
                }

                let claimable = match referrals.find_by_pair(referrer, referred_id).await? {
                    Some(row) => Some((row, false)),
                    None => referrals
                        .find_pending_click(code)
                        .await?
                        .map(|row| (row, true)),
                };

                match claimable {
                    Some((mut row, claims)) => {
                        if let Err(e) = row.register(referred_id, now) {
                            return Ok(Err(e.into()));
                        }
                        let stored = referrals.update_tracking(&row).await?;
                        Ok(Ok((stored, claims)))
                    }
                    None => {
                        let row =
                            ReferralTracking::from_registration(referrer, code, referred_id, now);
                        referrals.insert_tracking(&row).await?;
                        Ok(Ok((row, true)))
                    }
                }
            })
            .await??;

        if newly_claimed {
            retry_conflicts(&self.retry, "referrer totals", || async move {
                referrals.add_referrer_totals(referrer, 1, Amount::ZERO).await
            })
            .await?;
        }
        self.grant_trigger(&tracking, RewardTrigger::Registration, now)
            .await?;

        info!(
            referrer = %referrer,
            referred = %referred_id,
            tracking = %tracking.id,
            "Referral registration recorded"
        );
        Ok(tracking)
    }

    /// Move a pending or registered row to `expired`.
    pub async fn expire(
        &self,
        tracking_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReferralTracking, AttributionError> {
        let referrals = &self.referrals;
        let expired = retry_conflicts(&self.retry, "referral expiry", || async move {
            let Some(mut row) = referrals.get_tracking(tracking_id).await? else {
                return Ok(Err(AttributionError::TrackingNotFound(
                    tracking_id.to_string(),
                )));
            };
            if let Err(e) = row.expire(now) {
                return Ok(Err(e.into()));
            }
            referrals.update_tracking(&row).await.map(Ok)
        })
        .await??;

        info!(tracking = %tracking_id, "Referral expired");
        Ok(expired)
    }

    /// Everything known about `user_id` as referrer and as referred user.
    pub async fn stats(&self, user_id: &str) -> Result<ReferralStats, AttributionError> {
        let rows = self.referrals.list_by_referrer(user_id, None).await?;

        let total_clicks = rows.iter().map(|r| r.click_count).sum();
        let registered_count = rows
            .iter()
            .filter(|r| matches!(r.status, ReferralStatus::Registered | ReferralStatus::Donated))
            .count() as i64;
        let donated_count = rows
            .iter()
            .filter(|r| r.status == ReferralStatus::Donated)
            .count() as i64;
        let total_referral_donations: Amount = rows.iter().map(|r| r.total_donations).sum();

        let tier = ReferralTier::for_totals(total_referral_donations, registered_count);
        let next = tier.next();

        let rewards = self.referrals.rewards_for_user(user_id).await?;
        let reward_stats = RewardStats {
            total_value: rewards.iter().map(|r| r.value).sum(),
            pending_count: rewards
                .iter()
                .filter(|r| r.status == RewardStatus::Pending)
                .count() as i64,
            rewards: rewards.into_iter().take(LISTED_REWARDS).collect(),
        };

        Ok(ReferralStats {
            user_id: user_id.to_string(),
            as_referrer: ReferrerStats {
                total_clicks,
                registered_count,
                donated_count,
                total_referral_donations,
                recent_referrals: rows.into_iter().take(RECENT_REFERRALS).collect(),
                tier,
                next_tier_amount_needed: next.map(|t| {
                    t.min_amount
                        .checked_sub(total_referral_donations)
                        .unwrap_or(Amount::ZERO)
                }),
                next_tier_referrals_needed: next
                    .map(|t| (t.min_referrals - registered_count).max(0)),
            },
            rewards: reward_stats,
            was_referred_by: self.referrals.find_by_referred(user_id).await?,
        })
    }

    /// Top referrers by donations from their converted referrals.
    ///
    /// Periods other than all-time are rolling windows ending at `now`.
    pub async fn leaderboard(
        &self,
        period: PeriodKind,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReferrerLeaderboardEntry>, AttributionError> {
        let since = rolling_window_days(period).map(|days| now - Duration::days(days));
        let top = self.referrals.top_referrers(since, limit).await?;

        Ok(top
            .into_iter()
            .zip(1..)
            .map(|(activity, rank)| ReferrerLeaderboardEntry {
                rank,
                tier: ReferralTier::for_totals(activity.total_donations, activity.referral_count),
                user_id: activity.user_id,
                referral_count: activity.referral_count,
                total_donations: activity.total_donations,
                donation_count: activity.donation_count,
            })
            .collect())
    }

    async fn resolve(&self, code: &str) -> Result<String, AttributionError> {
        self.resolver
            .resolve_referral_code(code)
            .await?
            .ok_or_else(|| AttributionError::UnknownCode(code.to_string()))
    }

    async fn grant_trigger(
        &self,
        tracking: &ReferralTracking,
        trigger: RewardTrigger,
        now: DateTime<Utc>,
    ) -> Result<bool, AttributionError> {
        let reward = ReferralReward::awarded(
            tracking,
            trigger.reward_type(),
            trigger.value(),
            trigger.description(),
            now,
        );
        self.grant(reward).await
    }

    /// Grant every badge the row's cumulative amount has reached.
    async fn grant_badges(
        &self,
        tracking: &ReferralTracking,
        now: DateTime<Utc>,
    ) -> Result<usize, AttributionError> {
        let reached = self
            .badges
            .achieved(tracking.total_donations, Applicability::Referral);
        let mut granted = 0;
        for milestone in reached.iter().rev() {
            let badge = ReferralReward::awarded(
                tracking,
                RewardType::Badge,
                Amount::from_major_units(1),
                &milestone.name,
                now,
            );
            if self.grant(badge).await? {
                granted += 1;
            }
        }
        Ok(granted)
    }

    async fn grant(&self, reward: ReferralReward) -> Result<bool, AttributionError> {
        let referrals = &self.referrals;
        let reward = &reward;
        let inserted = retry_conflicts(&self.retry, "referral reward", || async move {
            referrals.grant_reward(reward).await
        })
        .await?;

        if inserted {
            debug!(
                user = %reward.user_id,
                tracking = %reward.tracking_id,
                reward = %reward.description,
                "Referral reward granted"
            );
        }
        Ok(inserted)
    }
}

fn rolling_window_days(period: PeriodKind) -> Option<i64> {
    match period {
        PeriodKind::Daily => Some(1),
        PeriodKind::Weekly => Some(7),
        PeriodKind::Monthly => Some(30),
        PeriodKind::Yearly => Some(365),
        PeriodKind::AllTime => None,
    }
}
