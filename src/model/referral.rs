//! Referral relationships, rewards and tiers.
//!
//! A [`ReferralTracking`] row follows one (referrer, referred identity) pair
//! through `pending -> registered -> donated`. `expired` is terminal and
//! only reached through an explicit expiry sweep.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, ParseEnumError};

/// State of a referral relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Registered,
    Donated,
    Expired,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Registered => "registered",
            ReferralStatus::Donated => "donated",
            ReferralStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReferralStatus::Pending),
            "registered" => Ok(ReferralStatus::Registered),
            "donated" => Ok(ReferralStatus::Donated),
            "expired" => Ok(ReferralStatus::Expired),
            other => Err(ParseEnumError::new("referral status", other)),
        }
    }
}

/// Where a referral click came from (`email`, `social`, `direct`, ...).
pub type AttributionSource = String;

/// Rejected state transition on a tracking row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("referral {0} has expired")]
    Expired(String),

    #[error("referral {tracking_id} is already claimed by {referred_id}")]
    AlreadyClaimed {
        tracking_id: String,
        referred_id: String,
    },

    #[error("referral {0} has already converted")]
    AlreadyConverted(String),
}

/// One referral relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralTracking {
    pub id: String,
    pub referrer_id: String,
    pub referred_id: Option<String>,
    pub referral_code: String,
    pub status: ReferralStatus,
    pub click_count: i64,
    pub first_clicked_at: Option<DateTime<Utc>>,
    pub registered_at: Option<DateTime<Utc>>,
    pub first_donation_at: Option<DateTime<Utc>>,
    pub total_donations: Amount,
    pub donation_count: i64,
    pub source: Option<AttributionSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by every stored update.
    pub version: i64,
}

impl ReferralTracking {
    fn blank(referrer_id: &str, code: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            referrer_id: referrer_id.to_string(),
            referred_id: None,
            referral_code: code.to_string(),
            status: ReferralStatus::Pending,
            click_count: 0,
            first_clicked_at: None,
            registered_at: None,
            first_donation_at: None,
            total_donations: Amount::ZERO,
            donation_count: 0,
            source: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// A fresh pending row for an anonymous click.
    pub fn from_click(
        referrer_id: &str,
        code: &str,
        source: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            click_count: 1,
            first_clicked_at: Some(now),
            source: source.map(str::to_string),
            ..Self::blank(referrer_id, code, now)
        }
    }

    /// A registered row for an identity that never clicked.
    pub fn from_registration(
        referrer_id: &str,
        code: &str,
        referred_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            referred_id: Some(referred_id.to_string()),
            status: ReferralStatus::Registered,
            registered_at: Some(now),
            ..Self::blank(referrer_id, code, now)
        }
    }

    /// A donated row created directly by a donation carrying the code.
    pub fn from_donation(
        referrer_id: &str,
        code: &str,
        referred_id: Option<&str>,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            referred_id: referred_id.map(str::to_string),
            status: ReferralStatus::Donated,
            first_donation_at: Some(now),
            total_donations: amount,
            donation_count: 1,
            ..Self::blank(referrer_id, code, now)
        }
    }

    pub fn is_expired(&self) -> bool {
        self.status == ReferralStatus::Expired
    }

    /// Another click on an existing pending row. Status is unchanged.
    pub fn record_click(&mut self, now: DateTime<Utc>) {
        self.click_count += 1;
        self.first_clicked_at.get_or_insert(now);
        self.updated_at = now;
    }

    /// Attach `referred_id` and move to `registered` unless already past it.
    pub fn register(
        &mut self,
        referred_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.is_expired() {
            return Err(TransitionError::Expired(self.id.clone()));
        }
        match &self.referred_id {
            Some(existing) if existing != referred_id => {
                return Err(TransitionError::AlreadyClaimed {
                    tracking_id: self.id.clone(),
                    referred_id: existing.clone(),
                });
            }
            Some(_) => {}
            None => self.referred_id = Some(referred_id.to_string()),
        }
        if self.status == ReferralStatus::Pending {
            self.status = ReferralStatus::Registered;
        }
        self.registered_at.get_or_insert(now);
        self.updated_at = now;
        Ok(())
    }

    /// Accumulate a donation. Returns true on the first transition into
    /// `donated`.
    pub fn record_donation(
        &mut self,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<bool, TransitionError> {
        if self.is_expired() {
            return Err(TransitionError::Expired(self.id.clone()));
        }
        self.total_donations = self.total_donations + amount;
        self.donation_count += 1;
        self.updated_at = now;

        let first = self.first_donation_at.is_none();
        if first {
            self.first_donation_at = Some(now);
            self.status = ReferralStatus::Donated;
        }
        Ok(first)
    }

    /// Terminal expiry of an unconverted relationship.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        match self.status {
            ReferralStatus::Expired => Err(TransitionError::Expired(self.id.clone())),
            ReferralStatus::Donated => Err(TransitionError::AlreadyConverted(self.id.clone())),
            ReferralStatus::Pending | ReferralStatus::Registered => {
                self.status = ReferralStatus::Expired;
                self.updated_at = now;
                Ok(())
            }
        }
    }
}

/// Kind of reward granted to a referrer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Points,
    Discount,
    Badge,
    Cash,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Points => "points",
            RewardType::Discount => "discount",
            RewardType::Badge => "badge",
            RewardType::Cash => "cash",
        }
    }
}

impl FromStr for RewardType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "points" => Ok(RewardType::Points),
            "discount" => Ok(RewardType::Discount),
            "badge" => Ok(RewardType::Badge),
            "cash" => Ok(RewardType::Cash),
            other => Err(ParseEnumError::new("reward type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
    Pending,
    Awarded,
    Redeemed,
    Expired,
}

impl RewardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardStatus::Pending => "pending",
            RewardStatus::Awarded => "awarded",
            RewardStatus::Redeemed => "redeemed",
            RewardStatus::Expired => "expired",
        }
    }
}

impl FromStr for RewardStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RewardStatus::Pending),
            "awarded" => Ok(RewardStatus::Awarded),
            "redeemed" => Ok(RewardStatus::Redeemed),
            "expired" => Ok(RewardStatus::Expired),
            other => Err(ParseEnumError::new("reward status", other)),
        }
    }
}

/// One-shot reward triggers on a tracking row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RewardTrigger {
    Registration,
    FirstDonation,
}

impl RewardTrigger {
    pub fn reward_type(&self) -> RewardType {
        RewardType::Points
    }

    pub fn value(&self) -> Amount {
        match self {
            RewardTrigger::Registration => Amount::from_major_units(100),
            RewardTrigger::FirstDonation => Amount::from_major_units(500),
        }
    }

    /// Description stored on the reward row; part of its uniqueness key.
    pub fn description(&self) -> &'static str {
        match self {
            RewardTrigger::Registration => "Referral registration bonus",
            RewardTrigger::FirstDonation => "First donation from referral",
        }
    }
}

/// Append-only reward record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralReward {
    pub id: String,
    pub user_id: String,
    pub tracking_id: String,
    pub reward_type: RewardType,
    pub value: Amount,
    pub description: String,
    pub status: RewardStatus,
    pub awarded_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ReferralReward {
    /// An already-awarded reward for `tracking`'s referrer.
    pub fn awarded(
        tracking: &ReferralTracking,
        reward_type: RewardType,
        value: Amount,
        description: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: tracking.referrer_id.clone(),
            tracking_id: tracking.id.clone(),
            reward_type,
            value,
            description: description.to_string(),
            status: RewardStatus::Awarded,
            awarded_at: Some(now),
            redeemed_at: None,
            expires_at: None,
        }
    }
}

/// Per-referrer denormalized counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerTotals {
    pub user_id: String,
    pub referral_count: i64,
    pub referral_donations_total: Amount,
}

/// Referrer recognition tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferralTier {
    pub key: &'static str,
    pub name: &'static str,
    pub min_amount: Amount,
    pub min_referrals: i64,
    pub badge_color: &'static str,
    pub perks: &'static [&'static str],
}

const TIERS: [ReferralTier; 5] = [
    ReferralTier {
        key: "bronze",
        name: "Bronze Advocate",
        min_amount: Amount::from_major_units(1_000),
        min_referrals: 1,
        badge_color: "#CD7F32",
        perks: &[
            "Monthly impact report",
            "Thank you badge on profile",
            "Name on supporter wall",
        ],
    },
    ReferralTier {
        key: "silver",
        name: "Silver Champion",
        min_amount: Amount::from_major_units(5_000),
        min_referrals: 3,
        badge_color: "#C0C0C0",
        perks: &[
            "Quarterly video updates from supported children",
            "Early access to impact stories",
            "Silver badge on leaderboard",
        ],
    },
    ReferralTier {
        key: "gold",
        name: "Gold Ambassador",
        min_amount: Amount::from_major_units(10_000),
        min_referrals: 5,
        badge_color: "#FFD700",
        perks: &[
            "Monthly video calls with program coordinators",
            "Behind-the-scenes content",
            "Invite to exclusive virtual events",
        ],
    },
    ReferralTier {
        key: "platinum",
        name: "Platinum Leader",
        min_amount: Amount::from_major_units(25_000),
        min_referrals: 10,
        badge_color: "#E5E4E2",
        perks: &[
            "1-on-1 virtual meet with beneficiary students",
            "Co-create impact initiatives",
            "Personal impact coordinator",
        ],
    },
    ReferralTier {
        key: "diamond",
        name: "Diamond Visionary",
        min_amount: Amount::from_major_units(50_000),
        min_referrals: 20,
        badge_color: "#B9F2FF",
        perks: &[
            "Annual appreciation ceremony invitation",
            "Naming opportunity for programs",
            "Legacy supporter status",
        ],
    },
];

impl ReferralTier {
    /// All tiers, lowest first.
    pub fn all() -> &'static [ReferralTier] {
        &TIERS
    }

    /// Highest tier whose amount and referral minima are both met.
    /// Everyone is at least bronze.
    pub fn for_totals(amount: Amount, referrals: i64) -> ReferralTier {
        TIERS
            .iter()
            .rev()
            .find(|tier| amount >= tier.min_amount && referrals >= tier.min_referrals)
            .copied()
            .unwrap_or(TIERS[0])
    }

    /// The tier after this one, if any.
    pub fn next(&self) -> Option<ReferralTier> {
        let idx = TIERS.iter().position(|tier| tier.key == self.key)?;
        TIERS.get(idx + 1).copied()
    }
}

/// Referrer-side view of a user's referral activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferrerStats {
    pub total_clicks: i64,
    pub registered_count: i64,
    pub donated_count: i64,
    pub total_referral_donations: Amount,
    pub recent_referrals: Vec<ReferralTracking>,
    pub tier: ReferralTier,
    /// Amount still needed for the next tier, `None` at the top tier.
    pub next_tier_amount_needed: Option<Amount>,
    pub next_tier_referrals_needed: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardStats {
    pub total_value: Amount,
    pub pending_count: i64,
    pub rewards: Vec<ReferralReward>,
}

/// Everything `get_referral_stats` reports for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferralStats {
    pub user_id: String,
    pub as_referrer: ReferrerStats,
    pub rewards: RewardStats,
    pub was_referred_by: Option<ReferralTracking>,
}

/// One row of the referral leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferrerLeaderboardEntry {
    pub rank: i64,
    pub user_id: String,
    pub referral_count: i64,
    pub total_donations: Amount,
    pub donation_count: i64,
    pub tier: ReferralTier,
}
