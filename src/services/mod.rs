//! Engine components.
//!
//! Each component owns one concern and talks to storage through the store
//! traits; [`crate::engine::DonationEngine`] wires them together and owns
//! the clock.

pub mod aggregate;
pub mod ingestion;
pub mod leaderboard;
pub mod milestone;
pub mod referral;
pub mod scheduler;

pub use aggregate::AggregateUpdater;
pub use ingestion::DonationIngestion;
pub use leaderboard::{LeaderboardRanker, RecomputeSummary};
pub use milestone::MilestoneEvaluator;
pub use referral::{AttributionEngine, AttributionError, AttributionOutcome, RejectReason};
pub use scheduler::LeaderboardScheduler;
