//! LeaderboardStore trait definition.

use std::collections::HashMap;

use async_trait::async_trait;

use super::Result;
use crate::model::{LeaderboardEntry, LeaderboardKey};

/// Interface for leaderboard snapshots.
///
/// The Leaderboard Ranker is the only writer.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Atomically replace the snapshot at `key` with `entries`.
    ///
    /// Entities missing from `entries` are removed. On error the previous
    /// snapshot is left untouched.
    async fn replace_snapshot(&self, key: &LeaderboardKey, entries: &[LeaderboardEntry])
        -> Result<()>;

    /// Entity id to rank for the snapshot at `key`. Empty when absent.
    async fn ranks(&self, key: &LeaderboardKey) -> Result<HashMap<String, i64>>;

    /// One page of the snapshot in rank order, plus the total entry count.
    async fn page(
        &self,
        key: &LeaderboardKey,
        limit: u64,
        offset: u64,
    ) -> Result<(i64, Vec<LeaderboardEntry>)>;

    async fn entry(&self, key: &LeaderboardKey, entity_id: &str)
        -> Result<Option<LeaderboardEntry>>;
}
