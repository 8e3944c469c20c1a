use std::collections::HashMap;

use async_trait::async_trait;

use super::MemoryStore;
use crate::model::{LeaderboardEntry, LeaderboardKey};
use crate::storage::{LeaderboardStore, Result, StorageError};

#[async_trait]
impl LeaderboardStore for MemoryStore {
    async fn replace_snapshot(
        &self,
        key: &LeaderboardKey,
        entries: &[LeaderboardEntry],
    ) -> Result<()> {
        if *self.fail_leaderboard_writes.read().await {
            return Err(StorageError::Unavailable(
                "leaderboard writes disabled".to_string(),
            ));
        }
        let mut snapshot = entries.to_vec();
        snapshot.sort_by_key(|entry| entry.rank);
        self.tables.write().await.leaderboards.insert(*key, snapshot);
        Ok(())
    }

    async fn ranks(&self, key: &LeaderboardKey) -> Result<HashMap<String, i64>> {
        let tables = self.tables.read().await;
        Ok(tables
            .leaderboards
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| (entry.entity_id.clone(), entry.rank))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn page(
        &self,
        key: &LeaderboardKey,
        limit: u64,
        offset: u64,
    ) -> Result<(i64, Vec<LeaderboardEntry>)> {
        let tables = self.tables.read().await;
        let Some(entries) = tables.leaderboards.get(key) else {
            return Ok((0, Vec::new()));
        };
        let page = entries
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((entries.len() as i64, page))
    }

    async fn entry(
        &self,
        key: &LeaderboardKey,
        entity_id: &str,
    ) -> Result<Option<LeaderboardEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .leaderboards
            .get(key)
            .and_then(|entries| entries.iter().find(|e| e.entity_id == entity_id))
            .cloned())
    }
}
