//! SQLite AggregateStore implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_query::{Alias, Expr, OnConflict, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::ledger_store::{apply_filter, unique_donors_expr};
use super::{begin_immediate, finish};
use crate::model::{Amount, DonationSummary, PeriodKind, RunningTotal, Window};
use crate::storage::helpers::{format_date, format_timestamp, parse_date, parse_timestamp};
use crate::storage::schema::{
    AggregateApplications, ChildTotals, DonationSummaries, Donations, RegionTotals,
    CREATE_AGGREGATE_TABLES,
};
use crate::storage::{AggregateDelta, AggregateStore, Direction, DonationFilter, Result};

/// SQLite implementation of AggregateStore.
///
/// Shares its pool with [`super::SqliteLedgerStore`]: unique-donor counts
/// are recomputed from the donations table inside the apply transaction.
pub struct SqliteAggregateStore {
    pool: SqlitePool,
}

impl SqliteAggregateStore {
    /// Create a new SQLite aggregate store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the aggregate tables if missing.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_AGGREGATE_TABLES)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn apply_in_tx(conn: &mut SqliteConnection, delta: &AggregateDelta) -> Result<bool> {
        let donation = &delta.donation;
        if !Self::should_apply(conn, &donation.id, delta.direction).await? {
            return Ok(false);
        }

        let at = format_timestamp(delta.at);
        let amount = delta.signed_minor_units();
        let count = delta.direction.sign();

        if let Some(child_id) = &donation.child_id {
            let seed = Query::insert()
                .into_table(ChildTotals::Table)
                .columns([
                    ChildTotals::ChildId,
                    ChildTotals::TotalReceivedMinor,
                    ChildTotals::DonationCount,
                    ChildTotals::UpdatedAt,
                ])
                .values_panic([
                    child_id.as_str().into(),
                    0i64.into(),
                    0i64.into(),
                    at.as_str().into(),
                ])
                .on_conflict(OnConflict::column(ChildTotals::ChildId).do_nothing().to_owned())
                .to_string(SqliteQueryBuilder);
            sqlx::query(&seed).execute(&mut *conn).await?;

            let bump = Query::update()
                .table(ChildTotals::Table)
                .value(
                    ChildTotals::TotalReceivedMinor,
                    Expr::cust_with_values("MAX(0, total_received_minor + ?)", [amount]),
                )
                .value(
                    ChildTotals::DonationCount,
                    Expr::cust_with_values("MAX(0, donation_count + ?)", [count]),
                )
                .value(ChildTotals::UpdatedAt, at.as_str())
                .and_where(Expr::col(ChildTotals::ChildId).eq(child_id.as_str()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&bump).execute(&mut *conn).await?;
        }

        if let Some(region_id) = &donation.region_id {
            let seed = Query::insert()
                .into_table(RegionTotals::Table)
                .columns([
                    RegionTotals::RegionId,
                    RegionTotals::TotalDonatedMinor,
                    RegionTotals::DonationCount,
                    RegionTotals::UpdatedAt,
                ])
                .values_panic([
                    region_id.as_str().into(),
                    0i64.into(),
                    0i64.into(),
                    at.as_str().into(),
                ])
                .on_conflict(OnConflict::column(RegionTotals::RegionId).do_nothing().to_owned())
                .to_string(SqliteQueryBuilder);
            sqlx::query(&seed).execute(&mut *conn).await?;

            let bump = Query::update()
                .table(RegionTotals::Table)
                .value(
                    RegionTotals::TotalDonatedMinor,
                    Expr::cust_with_values("MAX(0, total_donated_minor + ?)", [amount]),
                )
                .value(
                    RegionTotals::DonationCount,
                    Expr::cust_with_values("MAX(0, donation_count + ?)", [count]),
                )
                .value(RegionTotals::UpdatedAt, at.as_str())
                .and_where(Expr::col(RegionTotals::RegionId).eq(region_id.as_str()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&bump).execute(&mut *conn).await?;

            for (period, bucket) in delta.buckets() {
                Self::bump_summary(conn, region_id, period, bucket, delta, &at).await?;
            }
        }

        let marker = Query::insert()
            .into_table(AggregateApplications::Table)
            .columns([
                AggregateApplications::DonationId,
                AggregateApplications::Direction,
                AggregateApplications::AppliedAt,
            ])
            .values_panic([
                donation.id.as_str().into(),
                delta.direction.as_str().into(),
                at.as_str().into(),
            ])
            .to_string(SqliteQueryBuilder);
        sqlx::query(&marker).execute(&mut *conn).await?;

        Ok(true)
    }

    /// Apply runs once and never after a revert; revert only undoes an apply.
    async fn should_apply(
        conn: &mut SqliteConnection,
        donation_id: &str,
        direction: Direction,
    ) -> Result<bool> {
        let query = Query::select()
            .column(AggregateApplications::Direction)
            .from(AggregateApplications::Table)
            .and_where(Expr::col(AggregateApplications::DonationId).eq(donation_id))
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
        let mut applied = false;
        let mut reverted = false;
        for row in &rows {
            match row.try_get::<String, _>("direction")?.as_str() {
                "apply" => applied = true,
                "revert" => reverted = true,
                _ => {}
            }
        }

        Ok(match direction {
            Direction::Apply => !applied && !reverted,
            Direction::Revert => applied && !reverted,
        })
    }

    async fn bump_summary(
        conn: &mut SqliteConnection,
        region_id: &str,
        period: PeriodKind,
        bucket: NaiveDate,
        delta: &AggregateDelta,
        at: &str,
    ) -> Result<()> {
        let bucket_date = format_date(bucket);

        let seed = Query::insert()
            .into_table(DonationSummaries::Table)
            .columns([
                DonationSummaries::RegionId,
                DonationSummaries::Period,
                DonationSummaries::BucketDate,
                DonationSummaries::TotalMinor,
                DonationSummaries::DonationCount,
                DonationSummaries::UniqueDonors,
                DonationSummaries::UpdatedAt,
            ])
            .values_panic([
                region_id.into(),
                period.as_str().into(),
                bucket_date.as_str().into(),
                0i64.into(),
                0i64.into(),
                0i64.into(),
                at.into(),
            ])
            .on_conflict(
                OnConflict::columns([
                    DonationSummaries::RegionId,
                    DonationSummaries::Period,
                    DonationSummaries::BucketDate,
                ])
                .do_nothing()
                .to_owned(),
            )
            .to_string(SqliteQueryBuilder);
        sqlx::query(&seed).execute(&mut *conn).await?;

        let unique = Self::unique_donors(
            conn,
            region_id,
            period.window(bucket),
            delta.ignored_donor.as_deref(),
        )
        .await?;

        let update = Query::update()
            .table(DonationSummaries::Table)
            .value(
                DonationSummaries::TotalMinor,
                Expr::cust_with_values("MAX(0, total_minor + ?)", [delta.signed_minor_units()]),
            )
            .value(
                DonationSummaries::DonationCount,
                Expr::cust_with_values("MAX(0, donation_count + ?)", [delta.direction.sign()]),
            )
            .value(DonationSummaries::UniqueDonors, unique)
            .value(DonationSummaries::UpdatedAt, at)
            .and_where(Expr::col(DonationSummaries::RegionId).eq(region_id))
            .and_where(Expr::col(DonationSummaries::Period).eq(period.as_str()))
            .and_where(Expr::col(DonationSummaries::BucketDate).eq(bucket_date.as_str()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&update).execute(&mut *conn).await?;

        Ok(())
    }

    /// Distinct real donors with completed donations in `region_id` inside
    /// `window`, read within the caller's transaction.
    async fn unique_donors(
        conn: &mut SqliteConnection,
        region_id: &str,
        window: Window,
        ignored_donor: Option<&str>,
    ) -> Result<i64> {
        let filter = DonationFilter::completed().region(region_id).within(window);
        let query = {
            let mut query = Query::select();
            query
                .expr_as(unique_donors_expr(ignored_donor), Alias::new("donors"))
                .from(Donations::Table);
            apply_filter(&mut query, &filter);
            query.to_string(SqliteQueryBuilder)
        };

        let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
        Ok(row.try_get("donors")?)
    }

    async fn set_total(&self, total: &RunningTotal, child: bool) -> Result<()> {
        let at = format_timestamp(total.updated_at);
        let query = if child {
            Query::insert()
                .into_table(ChildTotals::Table)
                .columns([
                    ChildTotals::ChildId,
                    ChildTotals::TotalReceivedMinor,
                    ChildTotals::DonationCount,
                    ChildTotals::UpdatedAt,
                ])
                .values_panic([
                    total.entity_id.as_str().into(),
                    total.total_amount.minor_units().into(),
                    total.donation_count.into(),
                    at.into(),
                ])
                .on_conflict(
                    OnConflict::column(ChildTotals::ChildId)
                        .update_columns([
                            ChildTotals::TotalReceivedMinor,
                            ChildTotals::DonationCount,
                            ChildTotals::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .to_string(SqliteQueryBuilder)
        } else {
            Query::insert()
                .into_table(RegionTotals::Table)
                .columns([
                    RegionTotals::RegionId,
                    RegionTotals::TotalDonatedMinor,
                    RegionTotals::DonationCount,
                    RegionTotals::UpdatedAt,
                ])
                .values_panic([
                    total.entity_id.as_str().into(),
                    total.total_amount.minor_units().into(),
                    total.donation_count.into(),
                    at.into(),
                ])
                .on_conflict(
                    OnConflict::column(RegionTotals::RegionId)
                        .update_columns([
                            RegionTotals::TotalDonatedMinor,
                            RegionTotals::DonationCount,
                            RegionTotals::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .to_string(SqliteQueryBuilder)
        };

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn replace_in_tx(
        conn: &mut SqliteConnection,
        region_id: &str,
        rows: &[DonationSummary],
    ) -> Result<()> {
        let delete = Query::delete()
            .from_table(DonationSummaries::Table)
            .and_where(Expr::col(DonationSummaries::RegionId).eq(region_id))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&delete).execute(&mut *conn).await?;

        if rows.is_empty() {
            return Ok(());
        }

        let insert = {
            let mut insert = Query::insert();
            insert.into_table(DonationSummaries::Table).columns(SUMMARY_COLUMNS);
            for row in rows {
                insert.values_panic([
                    row.region_id.as_str().into(),
                    row.period.as_str().into(),
                    format_date(row.bucket_date).into(),
                    row.total_amount.minor_units().into(),
                    row.donation_count.into(),
                    row.unique_donors.into(),
                    format_timestamp(row.updated_at).into(),
                ]);
            }
            insert.to_string(SqliteQueryBuilder)
        };
        sqlx::query(&insert).execute(&mut *conn).await?;

        Ok(())
    }
}

const SUMMARY_COLUMNS: [DonationSummaries; 7] = [
    DonationSummaries::RegionId,
    DonationSummaries::Period,
    DonationSummaries::BucketDate,
    DonationSummaries::TotalMinor,
    DonationSummaries::DonationCount,
    DonationSummaries::UniqueDonors,
    DonationSummaries::UpdatedAt,
];

fn summary_from_row(row: &SqliteRow) -> Result<DonationSummary> {
    Ok(DonationSummary {
        region_id: row.try_get("region_id")?,
        period: row.try_get::<String, _>("period")?.parse()?,
        bucket_date: parse_date(&row.try_get::<String, _>("bucket_date")?)?,
        total_amount: Amount::from_minor_units(row.try_get("total_minor")?),
        donation_count: row.try_get("donation_count")?,
        unique_donors: row.try_get("unique_donors")?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn running_total(
    entity_id: String,
    total_minor: i64,
    donation_count: i64,
    updated_at: &str,
) -> Result<RunningTotal> {
    let updated_at: DateTime<Utc> = parse_timestamp(updated_at)?;
    Ok(RunningTotal {
        entity_id,
        total_amount: Amount::from_minor_units(total_minor),
        donation_count,
        updated_at,
    })
}

#[async_trait]
impl AggregateStore for SqliteAggregateStore {
    async fn apply(&self, delta: &AggregateDelta) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = Self::apply_in_tx(&mut conn, delta).await;
        finish(&mut conn, result).await
    }

    async fn child_total(&self, child_id: &str) -> Result<Option<RunningTotal>> {
        let query = Query::select()
            .columns([
                ChildTotals::ChildId,
                ChildTotals::TotalReceivedMinor,
                ChildTotals::DonationCount,
                ChildTotals::UpdatedAt,
            ])
            .from(ChildTotals::Table)
            .and_where(Expr::col(ChildTotals::ChildId).eq(child_id))
            .to_string(SqliteQueryBuilder);

        let Some(row) = sqlx::query(&query).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        running_total(
            row.try_get("child_id")?,
            row.try_get("total_received_minor")?,
            row.try_get("donation_count")?,
            &row.try_get::<String, _>("updated_at")?,
        )
        .map(Some)
    }

    async fn region_total(&self, region_id: &str) -> Result<Option<RunningTotal>> {
        let query = Query::select()
            .columns([
                RegionTotals::RegionId,
                RegionTotals::TotalDonatedMinor,
                RegionTotals::DonationCount,
                RegionTotals::UpdatedAt,
            ])
            .from(RegionTotals::Table)
            .and_where(Expr::col(RegionTotals::RegionId).eq(region_id))
            .to_string(SqliteQueryBuilder);

        let Some(row) = sqlx::query(&query).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        running_total(
            row.try_get("region_id")?,
            row.try_get("total_donated_minor")?,
            row.try_get("donation_count")?,
            &row.try_get::<String, _>("updated_at")?,
        )
        .map(Some)
    }

    async fn set_child_total(&self, total: &RunningTotal) -> Result<()> {
        self.set_total(total, true).await
    }

    async fn set_region_total(&self, total: &RunningTotal) -> Result<()> {
        self.set_total(total, false).await
    }

    async fn summary(
        &self,
        region_id: &str,
        period: PeriodKind,
        bucket_date: NaiveDate,
    ) -> Result<Option<DonationSummary>> {
        let query = Query::select()
            .columns(SUMMARY_COLUMNS)
            .from(DonationSummaries::Table)
            .and_where(Expr::col(DonationSummaries::RegionId).eq(region_id))
            .and_where(Expr::col(DonationSummaries::Period).eq(period.as_str()))
            .and_where(Expr::col(DonationSummaries::BucketDate).eq(format_date(bucket_date)))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(summary_from_row).transpose()
    }

    async fn summaries(
        &self,
        period: PeriodKind,
        bucket_date: Option<NaiveDate>,
    ) -> Result<Vec<DonationSummary>> {
        let query = {
            let mut query = Query::select();
            query
                .columns(SUMMARY_COLUMNS)
                .from(DonationSummaries::Table)
                .and_where(Expr::col(DonationSummaries::Period).eq(period.as_str()));
            if let Some(date) = bucket_date {
                query.and_where(Expr::col(DonationSummaries::BucketDate).eq(format_date(date)));
            }
            query
                .order_by(DonationSummaries::TotalMinor, Order::Desc)
                .order_by(DonationSummaries::RegionId, Order::Asc)
                .order_by(DonationSummaries::BucketDate, Order::Desc);
            query.to_string(SqliteQueryBuilder)
        };

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(summary_from_row).collect()
    }

    async fn region_summaries(&self, region_id: &str) -> Result<Vec<DonationSummary>> {
        let query = Query::select()
            .columns(SUMMARY_COLUMNS)
            .from(DonationSummaries::Table)
            .and_where(Expr::col(DonationSummaries::RegionId).eq(region_id))
            .order_by(DonationSummaries::BucketDate, Order::Desc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let mut summaries = rows
            .iter()
            .map(summary_from_row)
            .collect::<Result<Vec<_>>>()?;
        // period is stored as text; order by the enum, keeping dates newest first
        summaries.sort_by(|a, b| {
            a.period
                .cmp(&b.period)
                .then_with(|| b.bucket_date.cmp(&a.bucket_date))
        });
        Ok(summaries)
    }

    async fn replace_region_summaries(
        &self,
        region_id: &str,
        rows: &[DonationSummary],
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        begin_immediate(&mut conn).await?;
        let result = Self::replace_in_tx(&mut conn, region_id, rows).await;
        finish(&mut conn, result).await
    }
}
