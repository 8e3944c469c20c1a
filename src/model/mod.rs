//! Domain types for the donation ledger.
//!
//! These are plain data types plus the small amount of pure logic that
//! belongs to them (period bucketing, referral state transitions, milestone
//! tables). Persistence lives in [`crate::storage`]; orchestration lives in
//! [`crate::services`].

pub mod amount;
pub mod donation;
pub mod leaderboard;
pub mod milestone;
pub mod period;
pub mod referral;

pub use amount::{Amount, AmountError, AMOUNT_SCALE, MAX_MINOR_UNITS};
pub use donation::{
    Donation, DonationMode, DonationRequest, DonationStatus, DonationSummary, DonationTarget,
    GroupTotal, RunningTotal, Totals,
};
pub use leaderboard::{Leaderboard, LeaderboardEntry, LeaderboardKey, LeaderboardKind};
pub use milestone::{Applicability, Milestone, MilestoneProgress, NextMilestone};
pub use period::{all_time_bucket, PeriodKind, Window};
pub use referral::{
    AttributionSource, ReferralReward, ReferralStats, ReferralStatus, ReferralTier,
    ReferralTracking, ReferrerLeaderboardEntry, ReferrerStats, ReferrerTotals, RewardStats,
    RewardStatus, RewardTrigger, RewardType, TransitionError,
};

/// Returned when a stored or configured tag does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
