//! SQLite ReferralStore implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Alias, Expr, OnConflict, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{begin_immediate, finish};
use crate::model::{
    Amount, ReferralReward, ReferralStatus, ReferralTracking, ReferrerTotals,
};
use crate::storage::helpers::{format_timestamp, parse_optional_timestamp, parse_timestamp};
use crate::storage::schema::{
    ReferralRewards, ReferralTracking as TrackingTable, ReferrerTotals as TotalsTable,
    CREATE_REFERRAL_TABLES,
};
use crate::storage::{ReferralStore, ReferrerActivity, Result, StorageError};

const TRACKING_COLUMNS: [TrackingTable; 15] = [
    TrackingTable::Id,
    TrackingTable::ReferrerId,
    TrackingTable::ReferredId,
    TrackingTable::ReferralCode,
    TrackingTable::Status,
    TrackingTable::ClickCount,
    TrackingTable::FirstClickedAt,
    TrackingTable::RegisteredAt,
    TrackingTable::FirstDonationAt,
    TrackingTable::TotalDonationsMinor,
    TrackingTable::DonationCount,
    TrackingTable::Source,
    TrackingTable::CreatedAt,
    TrackingTable::UpdatedAt,
    TrackingTable::Version,
];

const REWARD_COLUMNS: [ReferralRewards; 10] = [
    ReferralRewards::Id,
    ReferralRewards::UserId,
    ReferralRewards::TrackingId,
    ReferralRewards::RewardType,
    ReferralRewards::ValueMinor,
    ReferralRewards::Description,
    ReferralRewards::Status,
    ReferralRewards::AwardedAt,
    ReferralRewards::RedeemedAt,
    ReferralRewards::ExpiresAt,
];

/// SQLite implementation of ReferralStore.
pub struct SqliteReferralStore {
    pool: SqlitePool,
}

impl SqliteReferralStore {
    /// Create a new SQLite referral store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the referral tables if missing.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_REFERRAL_TABLES)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn first_tracking(&self, query: String) -> Result<Option<ReferralTracking>> {
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(tracking_from_row).transpose()
    }

    async fn add_totals_in_tx(
        conn: &mut SqliteConnection,
        user_id: &str,
        referrals: i64,
        donations: Amount,
    ) -> Result<ReferrerTotals> {
        let seed = Query::insert()
            .into_table(TotalsTable::Table)
            .columns([
                TotalsTable::UserId,
                TotalsTable::ReferralCount,
                TotalsTable::ReferralDonationsMinor,
            ])
            .values_panic([user_id.into(), 0i64.into(), 0i64.into()])
            .on_conflict(OnConflict::column(TotalsTable::UserId).do_nothing().to_owned())
            .to_string(SqliteQueryBuilder);
        sqlx::query(&seed).execute(&mut *conn).await?;

        let update = Query::update()
            .table(TotalsTable::Table)
            .value(
                TotalsTable::ReferralCount,
                Expr::col(TotalsTable::ReferralCount).add(referrals),
            )
            .value(
                TotalsTable::ReferralDonationsMinor,
                Expr::col(TotalsTable::ReferralDonationsMinor).add(donations.minor_units()),
            )
            .and_where(Expr::col(TotalsTable::UserId).eq(user_id))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&update).execute(&mut *conn).await?;

        let select = totals_query(user_id);
        let row = sqlx::query(&select).fetch_one(&mut *conn).await?;
        totals_from_row(&row)
    }
}

fn tracking_from_row(row: &SqliteRow) -> Result<ReferralTracking> {
    Ok(ReferralTracking {
        id: row.try_get("id")?,
        referrer_id: row.try_get("referrer_id")?,
        referred_id: row.try_get("referred_id")?,
        referral_code: row.try_get("referral_code")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        click_count: row.try_get("click_count")?,
        first_clicked_at: parse_optional_timestamp(row.try_get("first_clicked_at")?)?,
        registered_at: parse_optional_timestamp(row.try_get("registered_at")?)?,
        first_donation_at: parse_optional_timestamp(row.try_get("first_donation_at")?)?,
        total_donations: Amount::from_minor_units(row.try_get("total_donations_minor")?),
        donation_count: row.try_get("donation_count")?,
        source: row.try_get("source")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
        version: row.try_get("version")?,
    })
}

fn reward_from_row(row: &SqliteRow) -> Result<ReferralReward> {
    Ok(ReferralReward {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        tracking_id: row.try_get("tracking_id")?,
        reward_type: row.try_get::<String, _>("reward_type")?.parse()?,
        value: Amount::from_minor_units(row.try_get("value_minor")?),
        description: row.try_get("description")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        awarded_at: parse_optional_timestamp(row.try_get("awarded_at")?)?,
        redeemed_at: parse_optional_timestamp(row.try_get("redeemed_at")?)?,
        expires_at: parse_optional_timestamp(row.try_get("expires_at")?)?,
    })
}

fn totals_query(user_id: &str) -> String {
    Query::select()
        .columns([
            TotalsTable::UserId,
            TotalsTable::ReferralCount,
            TotalsTable::ReferralDonationsMinor,
        ])
        .from(TotalsTable::Table)
        .and_where(Expr::col(TotalsTable::UserId).eq(user_id))
        .to_string(SqliteQueryBuilder)
}

fn totals_from_row(row: &SqliteRow) -> Result<ReferrerTotals> {
    Ok(ReferrerTotals {
        user_id: row.try_get("user_id")?,
        referral_count: row.try_get("referral_count")?,
        referral_donations_total: Amount::from_minor_units(
            row.try_get("referral_donations_minor")?,
        ),
    })
}

fn optional_timestamp(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(format_timestamp)
}

#[async_trait]
impl ReferralStore for SqliteReferralStore {
    async fn get_tracking(&self, tracking_id: &str) -> Result<Option<ReferralTracking>> {
        let query = Query::select()
            .columns(TRACKING_COLUMNS)
            .from(TrackingTable::Table)
            .and_where(Expr::col(TrackingTable::Id).eq(tracking_id))
            .to_string(SqliteQueryBuilder);
        self.first_tracking(query).await
    }

    async fn find_pending_click(&self, code: &str) -> Result<Option<ReferralTracking>> {
        let query = Query::select()
            .columns(TRACKING_COLUMNS)
            .from(TrackingTable::Table)
            .and_where(Expr::col(TrackingTable::ReferralCode).eq(code))
            .and_where(Expr::col(TrackingTable::Status).eq(ReferralStatus::Pending.as_str()))
            .and_where(Expr::col(TrackingTable::ReferredId).is_null())
            .order_by(TrackingTable::CreatedAt, Order::Asc)
            .order_by(TrackingTable::Id, Order::Asc)
            .limit(1)
            .to_string(SqliteQueryBuilder);
        self.first_tracking(query).await
    }

    async fn find_by_referred(&self, referred_id: &str) -> Result<Option<ReferralTracking>> {
        let query = Query::select()
            .columns(TRACKING_COLUMNS)
            .from(TrackingTable::Table)
            .and_where(Expr::col(TrackingTable::ReferredId).eq(referred_id))
            .order_by(TrackingTable::CreatedAt, Order::Asc)
            .order_by(TrackingTable::Id, Order::Asc)
            .limit(1)
            .to_string(SqliteQueryBuilder);
        self.first_tracking(query).await
    }

    async fn find_by_pair(
        &self,
        referrer_id: &str,
        referred_id: &str,
    ) -> Result<Option<ReferralTracking>> {
        let query = Query::select()
            .columns(TRACKING_COLUMNS)
            .from(TrackingTable::Table)
            .and_where(Expr::col(TrackingTable::ReferrerId).eq(referrer_id))
            .and_where(Expr::col(TrackingTable::ReferredId).eq(referred_id))
            .order_by(TrackingTable::CreatedAt, Order::Asc)
            .limit(1)
            .to_string(SqliteQueryBuilder);
        self.first_tracking(query).await
    }

    async fn insert_tracking(&self, tracking: &ReferralTracking) -> Result<()> {
        let query = Query::insert()
            .into_table(TrackingTable::Table)
            .columns(TRACKING_COLUMNS)
            .values_panic([
                tracking.id.as_str().into(),
                tracking.referrer_id.as_str().into(),
                tracking.referred_id.clone().into(),
                tracking.referral_code.as_str().into(),
                tracking.status.as_str().into(),
                tracking.click_count.into(),
                optional_timestamp(tracking.first_clicked_at).into(),
                optional_timestamp(tracking.registered_at).into(),
                optional_timestamp(tracking.first_donation_at).into(),
                tracking.total_donations.minor_units().into(),
                tracking.donation_count.into(),
                tracking.source.clone().into(),
                format_timestamp(tracking.created_at).into(),
                format_timestamp(tracking.updated_at).into(),
                tracking.version.into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn update_tracking(&self, tracking: &ReferralTracking) -> Result<ReferralTracking> {
        let next_version = tracking.version + 1;
        let query = Query::update()
            .table(TrackingTable::Table)
            .value(TrackingTable::ReferredId, tracking.referred_id.clone())
            .value(TrackingTable::Status, tracking.status.as_str())
            .value(TrackingTable::ClickCount, tracking.click_count)
            .value(
                TrackingTable::FirstClickedAt,
                optional_timestamp(tracking.first_clicked_at),
            )
            .value(
                TrackingTable::RegisteredAt,
                optional_timestamp(tracking.registered_at),
            )
            .value(
                TrackingTable::FirstDonationAt,
                optional_timestamp(tracking.first_donation_at),
            )
            .value(
                TrackingTable::TotalDonationsMinor,
                tracking.total_donations.minor_units(),
            )
            .value(TrackingTable::DonationCount, tracking.donation_count)
            .value(TrackingTable::Source, tracking.source.clone())
            .value(TrackingTable::UpdatedAt, format_timestamp(tracking.updated_at))
            .value(TrackingTable::Version, next_version)
            .and_where(Expr::col(TrackingTable::Id).eq(tracking.id.as_str()))
            .and_where(Expr::col(TrackingTable::Version).eq(tracking.version))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return match self.get_tracking(&tracking.id).await? {
                Some(stored) => Err(StorageError::Conflict(format!(
                    "referral {} is at version {}, expected {}",
                    tracking.id, stored.version, tracking.version
                ))),
                None => Err(StorageError::NotFound {
                    entity: "referral tracking",
                    id: tracking.id.clone(),
                }),
            };
        }

        let mut updated = tracking.clone();
        updated.version = next_version;
        Ok(updated)
    }

    async fn list_by_referrer(
        &self,
        referrer_id: &str,
        limit: Option<u64>,
    ) -> Result<Vec<ReferralTracking>> {
        let query = {
            let mut query = Query::select();
            query
                .columns(TRACKING_COLUMNS)
                .from(TrackingTable::Table)
                .and_where(Expr::col(TrackingTable::ReferrerId).eq(referrer_id))
                .order_by(TrackingTable::CreatedAt, Order::Desc)
                .order_by(TrackingTable::Id, Order::Desc);
            if let Some(limit) = limit {
                query.limit(limit);
            }
            query.to_string(SqliteQueryBuilder)
        };

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(tracking_from_row).collect()
    }

    async fn grant_reward(&self, reward: &ReferralReward) -> Result<bool> {
        let query = Query::insert()
            .into_table(ReferralRewards::Table)
            .columns(REWARD_COLUMNS)
            .values_panic([
                reward.id.as_str().into(),
                reward.user_id.as_str().into(),
                reward.tracking_id.as_str().into(),
                reward.reward_type.as_str().into(),
                reward.value.minor_units().into(),
                reward.description.as_str().into(),
                reward.status.as_str().into(),
                optional_timestamp(reward.awarded_at).into(),
                optional_timestamp(reward.redeemed_at).into(),
                optional_timestamp(reward.expires_at).into(),
            ])
            .on_conflict(
                OnConflict::columns([ReferralRewards::TrackingId, ReferralRewards::Description])
                    .do_nothing()
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn rewards_for_tracking(&self, tracking_id: &str) -> Result<Vec<ReferralReward>> {
        let query = Query::select()
            .columns(REWARD_COLUMNS)
            .from(ReferralRewards::Table)
            .and_where(Expr::col(ReferralRewards::TrackingId).eq(tracking_id))
            .order_by_expr(Expr::cust("rowid"), Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(reward_from_row).collect()
    }

    async fn rewards_for_user(&self, user_id: &str) -> Result<Vec<ReferralReward>> {
        let query = Query::select()
            .columns(REWARD_COLUMNS)
            .from(ReferralRewards::Table)
            .and_where(Expr::col(ReferralRewards::UserId).eq(user_id))
            .order_by(ReferralRewards::AwardedAt, Order::Desc)
            .order_by_expr(Expr::cust("rowid"), Order::Desc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(reward_from_row).collect()
    }

    async fn add_referrer_totals(
        &self,
        user_id: &str,
        referrals: i64,
        donations: Amount,
    ) -> Result<ReferrerTotals> {
        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = Self::add_totals_in_tx(&mut conn, user_id, referrals, donations).await;
        finish(&mut conn, result).await
    }

    async fn referrer_totals(&self, user_id: &str) -> Result<ReferrerTotals> {
        let query = totals_query(user_id);
        match sqlx::query(&query).fetch_optional(&self.pool).await? {
            Some(row) => totals_from_row(&row),
            None => Ok(ReferrerTotals {
                user_id: user_id.to_string(),
                ..ReferrerTotals::default()
            }),
        }
    }

    async fn top_referrers(
        &self,
        since: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Vec<ReferrerActivity>> {
        let query = {
            let mut query = Query::select();
            query
                .column(TrackingTable::ReferrerId)
                .expr_as(Expr::col(TrackingTable::Id).count(), Alias::new("referrals"))
                .expr_as(
                    Expr::col(TrackingTable::TotalDonationsMinor).sum(),
                    Alias::new("total"),
                )
                .expr_as(
                    Expr::col(TrackingTable::DonationCount).sum(),
                    Alias::new("donations"),
                )
                .from(TrackingTable::Table)
                .and_where(Expr::col(TrackingTable::Status).eq(ReferralStatus::Donated.as_str()));
            if let Some(since) = since {
                query.and_where(
                    Expr::col(TrackingTable::FirstDonationAt).gte(format_timestamp(since)),
                );
            }
            query
                .group_by_col(TrackingTable::ReferrerId)
                .order_by(Alias::new("total"), Order::Desc)
                .order_by(TrackingTable::ReferrerId, Order::Asc)
                .limit(limit);
            query.to_string(SqliteQueryBuilder)
        };

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<ReferrerActivity> {
                Ok(ReferrerActivity {
                    user_id: row.try_get("referrer_id")?,
                    referral_count: row.try_get("referrals")?,
                    total_donations: Amount::from_minor_units(row.try_get("total")?),
                    donation_count: row.try_get("donations")?,
                })
            })
            .collect()
    }
}
