//! SQLite LeaderboardStore implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_query::{Alias, Expr, Order, Query, SelectStatement, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{begin_immediate, finish};
use crate::model::{Amount, LeaderboardEntry, LeaderboardKey};
use crate::storage::helpers::{format_date, format_timestamp, parse_date, parse_timestamp};
use crate::storage::schema::{LeaderboardEntries, CREATE_LEADERBOARD_TABLE};
use crate::storage::{LeaderboardStore, Result};

const ENTRY_COLUMNS: [LeaderboardEntries; 10] = [
    LeaderboardEntries::Kind,
    LeaderboardEntries::Period,
    LeaderboardEntries::BucketDate,
    LeaderboardEntries::EntityId,
    LeaderboardEntries::EntityName,
    LeaderboardEntries::Rank,
    LeaderboardEntries::RankChange,
    LeaderboardEntries::TotalMinor,
    LeaderboardEntries::DonationCount,
    LeaderboardEntries::UpdatedAt,
];

/// SQLite implementation of LeaderboardStore.
pub struct SqliteLeaderboardStore {
    pool: SqlitePool,
}

impl SqliteLeaderboardStore {
    /// Create a new SQLite leaderboard store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the leaderboard table if missing.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_LEADERBOARD_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_in_tx(
        conn: &mut SqliteConnection,
        key: &LeaderboardKey,
        entries: &[LeaderboardEntry],
    ) -> Result<()> {
        let delete = Query::delete()
            .from_table(LeaderboardEntries::Table)
            .and_where(Expr::col(LeaderboardEntries::Kind).eq(key.kind.as_str()))
            .and_where(Expr::col(LeaderboardEntries::Period).eq(key.period.as_str()))
            .and_where(Expr::col(LeaderboardEntries::BucketDate).eq(format_date(key.bucket_date)))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&delete).execute(&mut *conn).await?;

        if entries.is_empty() {
            return Ok(());
        }

        let insert = {
            let mut insert = Query::insert();
            insert
                .into_table(LeaderboardEntries::Table)
                .columns(ENTRY_COLUMNS);
            for entry in entries {
                insert.values_panic([
                    key.kind.as_str().into(),
                    key.period.as_str().into(),
                    format_date(key.bucket_date).into(),
                    entry.entity_id.as_str().into(),
                    entry.entity_name.clone().into(),
                    entry.rank.into(),
                    entry.rank_change.into(),
                    entry.total_amount.minor_units().into(),
                    entry.donation_count.into(),
                    format_timestamp(entry.updated_at).into(),
                ]);
            }
            insert.to_string(SqliteQueryBuilder)
        };
        sqlx::query(&insert).execute(&mut *conn).await?;

        Ok(())
    }
}

fn scoped(query: &mut SelectStatement, key: &LeaderboardKey) {
    query
        .from(LeaderboardEntries::Table)
        .and_where(Expr::col(LeaderboardEntries::Kind).eq(key.kind.as_str()))
        .and_where(Expr::col(LeaderboardEntries::Period).eq(key.period.as_str()))
        .and_where(Expr::col(LeaderboardEntries::BucketDate).eq(format_date(key.bucket_date)));
}

fn entry_from_row(row: &SqliteRow) -> Result<LeaderboardEntry> {
    Ok(LeaderboardEntry {
        kind: row.try_get::<String, _>("kind")?.parse()?,
        period: row.try_get::<String, _>("period")?.parse()?,
        bucket_date: parse_date(&row.try_get::<String, _>("bucket_date")?)?,
        entity_id: row.try_get("entity_id")?,
        entity_name: row.try_get("entity_name")?,
        rank: row.try_get("rank")?,
        rank_change: row.try_get("rank_change")?,
        total_amount: Amount::from_minor_units(row.try_get("total_minor")?),
        donation_count: row.try_get("donation_count")?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

#[async_trait]
impl LeaderboardStore for SqliteLeaderboardStore {
    async fn replace_snapshot(
        &self,
        key: &LeaderboardKey,
        entries: &[LeaderboardEntry],
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = Self::replace_in_tx(&mut conn, key, entries).await;
        finish(&mut conn, result).await
    }

    async fn ranks(&self, key: &LeaderboardKey) -> Result<HashMap<String, i64>> {
        let query = {
            let mut query = Query::select();
            query.columns([LeaderboardEntries::EntityId, LeaderboardEntries::Rank]);
            scoped(&mut query, key);
            query.to_string(SqliteQueryBuilder)
        };

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<(String, i64)> {
                Ok((row.try_get("entity_id")?, row.try_get("rank")?))
            })
            .collect()
    }

    async fn page(
        &self,
        key: &LeaderboardKey,
        limit: u64,
        offset: u64,
    ) -> Result<(i64, Vec<LeaderboardEntry>)> {
        let count = {
            let mut count = Query::select();
            count.expr_as(Expr::col(LeaderboardEntries::EntityId).count(), Alias::new("entries"));
            scoped(&mut count, key);
            count.to_string(SqliteQueryBuilder)
        };
        let total: i64 = sqlx::query(&count)
            .fetch_one(&self.pool)
            .await?
            .try_get("entries")?;

        let query = {
            let mut query = Query::select();
            query.columns(ENTRY_COLUMNS);
            scoped(&mut query, key);
            query
                .order_by(LeaderboardEntries::Rank, Order::Asc)
                .limit(limit)
                .offset(offset);
            query.to_string(SqliteQueryBuilder)
        };

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let entries = rows
            .iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((total, entries))
    }

    async fn entry(
        &self,
        key: &LeaderboardKey,
        entity_id: &str,
    ) -> Result<Option<LeaderboardEntry>> {
        let query = {
            let mut query = Query::select();
            query.columns(ENTRY_COLUMNS);
            scoped(&mut query, key);
            query.and_where(Expr::col(LeaderboardEntries::EntityId).eq(entity_id));
            query.to_string(SqliteQueryBuilder)
        };

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(entry_from_row).transpose()
    }
}
