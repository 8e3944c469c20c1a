//! Leaderboard Ranker.
//!
//! Rebuilds ranked snapshots from committed ledger rows. Each run replaces
//! one (kind, period, bucket) snapshot wholesale, so entities that dropped
//! out of the bucket disappear and a failed run leaves the old snapshot in
//! place.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::interfaces::Directory;
use crate::model::{
    Amount, GroupTotal, Leaderboard, LeaderboardEntry, LeaderboardKey, LeaderboardKind,
    PeriodKind,
};
use crate::storage::{DonationFilter, GroupBy, LeaderboardStore, LedgerStore};

/// Outcome of a full recompute pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeSummary {
    /// Snapshots replaced.
    pub snapshots: usize,
    /// Entries written across all snapshots.
    pub entries: usize,
    /// Keys whose run failed and kept their previous snapshot.
    pub failed: Vec<LeaderboardKey>,
}

/// Ranked totals for one entity before ranks are assigned.
struct Standing {
    entity_id: String,
    entity_name: Option<String>,
    total_amount: Amount,
    donation_count: i64,
}

/// Computes and serves leaderboard snapshots.
pub struct LeaderboardRanker {
    ledger: Arc<dyn LedgerStore>,
    leaderboards: Arc<dyn LeaderboardStore>,
    directory: Arc<dyn Directory>,
    /// Guest sentinel, left off donor leaderboards.
    ignored_donor: Option<String>,
}

impl LeaderboardRanker {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        leaderboards: Arc<dyn LeaderboardStore>,
        directory: Arc<dyn Directory>,
        ignored_donor: Option<String>,
    ) -> Self {
        Self {
            ledger,
            leaderboards,
            directory,
            ignored_donor,
        }
    }

    /// Recompute and atomically replace the snapshot at `key`.
    pub async fn recompute(
        &self,
        key: LeaderboardKey,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let filter = DonationFilter::completed()
            .within(key.period.window(key.bucket_date))
            .ignoring_donor(self.ignored_donor.as_deref());

        let mut standings = match key.kind {
            LeaderboardKind::Donor => self
                .ledger
                .group_totals(GroupBy::Donor, &filter)
                .await?
                .into_iter()
                .map(Standing::unnamed)
                .collect(),
            LeaderboardKind::Region => self.region_standings(&filter).await?,
            LeaderboardKind::School => self.school_standings(&filter).await?,
        };
        standings.sort_by(|a, b| {
            b.total_amount
                .cmp(&a.total_amount)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });

        let previous = match key.previous() {
            Some(previous) => self.leaderboards.ranks(&previous).await?,
            None => HashMap::new(),
        };

        let entries: Vec<LeaderboardEntry> = standings
            .into_iter()
            .zip(1..)
            .map(|(standing, rank)| LeaderboardEntry {
                kind: key.kind,
                period: key.period,
                bucket_date: key.bucket_date,
                rank,
                rank_change: previous
                    .get(&standing.entity_id)
                    .map_or(0, |previous_rank| previous_rank - rank),
                entity_id: standing.entity_id,
                entity_name: standing.entity_name,
                total_amount: standing.total_amount,
                donation_count: standing.donation_count,
                updated_at: now,
            })
            .collect();

        self.leaderboards.replace_snapshot(&key, &entries).await?;

        debug!(key = %key, entries = entries.len(), "Leaderboard snapshot replaced");
        Ok(entries)
    }

    /// Recompute every kind and period for the buckets containing `now`.
    ///
    /// A failing key is logged and skipped; the others still run.
    pub async fn recompute_all(&self, now: DateTime<Utc>) -> RecomputeSummary {
        let mut summary = RecomputeSummary::default();

        for kind in LeaderboardKind::ALL {
            for period in PeriodKind::ALL {
                let key = LeaderboardKey::new(kind, period, now.date_naive());
                match self.recompute(key, now).await {
                    Ok(entries) => {
                        summary.snapshots += 1;
                        summary.entries += entries.len();
                    }
                    Err(e) => {
                        error!(key = %key, error = %e, "Leaderboard recompute failed");
                        summary.failed.push(key);
                    }
                }
            }
        }

        info!(
            snapshots = summary.snapshots,
            entries = summary.entries,
            failed = summary.failed.len(),
            "Leaderboards recomputed"
        );
        summary
    }

    /// One page of the current snapshot for `kind` and `period`.
    pub async fn page(
        &self,
        kind: LeaderboardKind,
        period: PeriodKind,
        limit: u64,
        offset: u64,
        now: DateTime<Utc>,
    ) -> Result<Leaderboard> {
        let key = LeaderboardKey::new(kind, period, now.date_naive());
        let (total_entries, entries) = self.leaderboards.page(&key, limit, offset).await?;
        Ok(Leaderboard {
            kind,
            period,
            bucket_date: key.bucket_date,
            total_entries,
            entries,
        })
    }

    /// An entity's row in the current snapshot, if it is ranked.
    pub async fn ranking(
        &self,
        kind: LeaderboardKind,
        entity_id: &str,
        period: PeriodKind,
        now: DateTime<Utc>,
    ) -> Result<Option<LeaderboardEntry>> {
        let key = LeaderboardKey::new(kind, period, now.date_naive());
        Ok(self.leaderboards.entry(&key, entity_id).await?)
    }

    async fn region_standings(&self, filter: &DonationFilter) -> Result<Vec<Standing>> {
        let groups = self.ledger.group_totals(GroupBy::Region, filter).await?;
        let mut standings = Vec::with_capacity(groups.len());
        for group in groups {
            let name = self
                .directory
                .region(&group.entity_id)
                .await?
                .map(|region| region.name);
            standings.push(Standing {
                entity_name: name,
                ..Standing::unnamed(group)
            });
        }
        Ok(standings)
    }

    /// Child totals folded into their schools. Children without a school are
    /// left out.
    async fn school_standings(&self, filter: &DonationFilter) -> Result<Vec<Standing>> {
        let groups = self.ledger.group_totals(GroupBy::Child, filter).await?;
        let mut schools: HashMap<String, (Amount, i64)> = HashMap::new();
        for group in groups {
            let school = self
                .directory
                .child(&group.entity_id)
                .await?
                .and_then(|child| child.school);
            let Some(school) = school else {
                continue;
            };
            let totals = schools.entry(school).or_insert((Amount::ZERO, 0));
            totals.0 = totals.0 + group.total_amount;
            totals.1 += group.donation_count;
        }

        Ok(schools
            .into_iter()
            .map(|(school, (total_amount, donation_count))| Standing {
                entity_name: Some(school.clone()),
                entity_id: school,
                total_amount,
                donation_count,
            })
            .collect())
    }
}

impl Standing {
    fn unnamed(group: GroupTotal) -> Self {
        Self {
            entity_id: group.entity_id,
            entity_name: None,
            total_amount: group.total_amount,
            donation_count: group.donation_count,
        }
    }
}
