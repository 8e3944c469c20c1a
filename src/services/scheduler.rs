//! Leaderboard recompute scheduler.
//!
//! Runs [`LeaderboardRanker::recompute_all`] on a fixed interval until the
//! shutdown future resolves. Runs as a long-lived daemon next to the
//! ingestion path; it only reads committed ledger rows.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::services::leaderboard::{LeaderboardRanker, RecomputeSummary};
use crate::utils::Clock;

/// Periodic leaderboard recompute loop.
pub struct LeaderboardScheduler {
    ranker: Arc<LeaderboardRanker>,
    clock: Arc<dyn Clock>,
    period: Duration,
}

impl LeaderboardScheduler {
    pub fn new(ranker: Arc<LeaderboardRanker>, clock: Arc<dyn Clock>, period: Duration) -> Self {
        Self {
            ranker,
            clock,
            period,
        }
    }

    /// Run one recompute pass now.
    pub async fn tick(&self) -> RecomputeSummary {
        self.ranker.recompute_all(self.clock.now()).await
    }

    /// Run the loop until `shutdown` resolves. The first pass runs
    /// immediately. Returns the number of passes run.
    pub async fn run<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        info!(interval = ?self.period, "Starting leaderboard scheduler");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut passes = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(passes, "Leaderboard scheduler stopped");
                    return passes;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                    passes += 1;
                }
            }
        }
    }
}
