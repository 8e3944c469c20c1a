//! SQLite LedgerStore implementation.

use async_trait::async_trait;
use sea_query::{Alias, Expr, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::model::{Amount, Donation, DonationStatus, GroupTotal, Totals};
use crate::storage::helpers::{format_timestamp, parse_timestamp};
use crate::storage::schema::{Donations, CREATE_DONATIONS_TABLE};
use crate::storage::{DonationFilter, GroupBy, LedgerStore, Result};

const DONATION_COLUMNS: [Donations; 15] = [
    Donations::Id,
    Donations::DonorId,
    Donations::ChildId,
    Donations::RegionId,
    Donations::AmountMinor,
    Donations::Currency,
    Donations::Mode,
    Donations::IsAnonymous,
    Donations::ReferralCode,
    Donations::TransactionId,
    Donations::PaymentMethod,
    Donations::Message,
    Donations::Target,
    Donations::Status,
    Donations::CreatedAt,
];

/// SQLite implementation of LedgerStore.
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a new SQLite ledger store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the donations table if missing.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_DONATIONS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Add the WHERE clauses for `filter` to `query`.
pub(super) fn apply_filter(query: &mut SelectStatement, filter: &DonationFilter) {
    if let Some(donor_id) = &filter.donor_id {
        query.and_where(Expr::col(Donations::DonorId).eq(donor_id.as_str()));
    }
    if let Some(child_id) = &filter.child_id {
        query.and_where(Expr::col(Donations::ChildId).eq(child_id.as_str()));
    }
    if let Some(region_id) = &filter.region_id {
        query.and_where(Expr::col(Donations::RegionId).eq(region_id.as_str()));
    }
    if let Some(code) = &filter.referral_code {
        query.and_where(Expr::col(Donations::ReferralCode).eq(code.as_str()));
    }
    if let Some(status) = filter.status {
        query.and_where(Expr::col(Donations::Status).eq(status.as_str()));
    }
    if let Some(start) = filter.window.start {
        query.and_where(Expr::col(Donations::CreatedAt).gte(format_timestamp(start)));
    }
    if let Some(end) = filter.window.end {
        query.and_where(Expr::col(Donations::CreatedAt).lt(format_timestamp(end)));
    }
}

/// `COUNT(DISTINCT donor_id)`, leaving out `ignored_donor`.
pub(super) fn unique_donors_expr(ignored_donor: Option<&str>) -> SimpleExpr {
    match ignored_donor {
        Some(ignored) => Expr::cust_with_values(
            "COUNT(DISTINCT CASE WHEN donor_id <> ? THEN donor_id END)",
            [ignored],
        ),
        None => Expr::cust("COUNT(DISTINCT donor_id)"),
    }
}

fn donation_from_row(row: &SqliteRow) -> Result<Donation> {
    Ok(Donation {
        id: row.try_get("id")?,
        donor_id: row.try_get("donor_id")?,
        child_id: row.try_get("child_id")?,
        region_id: row.try_get("region_id")?,
        amount: Amount::from_minor_units(row.try_get("amount_minor")?),
        currency: row.try_get("currency")?,
        mode: row.try_get::<String, _>("mode")?.parse()?,
        is_anonymous: row.try_get("is_anonymous")?,
        referral_code: row.try_get("referral_code")?,
        transaction_id: row.try_get("transaction_id")?,
        payment_method: row.try_get("payment_method")?,
        message: row.try_get("message")?,
        target: row.try_get::<String, _>("target")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn insert(&self, donation: &Donation) -> Result<()> {
        let query = Query::insert()
            .into_table(Donations::Table)
            .columns(DONATION_COLUMNS)
            .values_panic([
                donation.id.as_str().into(),
                donation.donor_id.clone().into(),
                donation.child_id.clone().into(),
                donation.region_id.clone().into(),
                donation.amount.minor_units().into(),
                donation.currency.as_str().into(),
                donation.mode.as_str().into(),
                donation.is_anonymous.into(),
                donation.referral_code.clone().into(),
                donation.transaction_id.clone().into(),
                donation.payment_method.clone().into(),
                donation.message.clone().into(),
                donation.target.as_str().into(),
                donation.status.as_str().into(),
                format_timestamp(donation.created_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, donation_id: &str) -> Result<Option<Donation>> {
        let query = Query::select()
            .columns(DONATION_COLUMNS)
            .from(Donations::Table)
            .and_where(Expr::col(Donations::Id).eq(donation_id))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(donation_from_row).transpose()
    }

    async fn transition_status(
        &self,
        donation_id: &str,
        from: DonationStatus,
        to: DonationStatus,
    ) -> Result<bool> {
        let query = Query::update()
            .table(Donations::Table)
            .value(Donations::Status, to.as_str())
            .and_where(Expr::col(Donations::Id).eq(donation_id))
            .and_where(Expr::col(Donations::Status).eq(from.as_str()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }

        match self.get(donation_id).await? {
            Some(_) => Ok(false),
            None => Err(crate::storage::StorageError::NotFound {
                entity: "donation",
                id: donation_id.to_string(),
            }),
        }
    }

    async fn list(&self, filter: &DonationFilter) -> Result<Vec<Donation>> {
        let query = {
            let mut query = Query::select();
            query.columns(DONATION_COLUMNS).from(Donations::Table);
            apply_filter(&mut query, filter);
            query
                .order_by(Donations::CreatedAt, Order::Desc)
                .order_by(Donations::Id, Order::Desc);
            if let Some(limit) = filter.limit {
                query.limit(limit);
            }
            query.to_string(SqliteQueryBuilder)
        };

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(donation_from_row).collect()
    }

    async fn totals(&self, filter: &DonationFilter) -> Result<Totals> {
        let query = {
            let mut query = Query::select();
            query
                .expr_as(Expr::col(Donations::AmountMinor).sum(), Alias::new("total"))
                .expr_as(Expr::col(Donations::Id).count(), Alias::new("donations"))
                .expr_as(
                    unique_donors_expr(filter.ignored_donor.as_deref()),
                    Alias::new("donors"),
                )
                .from(Donations::Table);
            apply_filter(&mut query, filter);
            query.to_string(SqliteQueryBuilder)
        };

        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        Ok(Totals {
            total_amount: Amount::from_minor_units(
                row.try_get::<Option<i64>, _>("total")?.unwrap_or(0),
            ),
            donation_count: row.try_get("donations")?,
            unique_donors: row.try_get("donors")?,
        })
    }

    async fn group_totals(
        &self,
        group_by: GroupBy,
        filter: &DonationFilter,
    ) -> Result<Vec<GroupTotal>> {
        let key = match group_by {
            GroupBy::Donor => Donations::DonorId,
            GroupBy::Region => Donations::RegionId,
            GroupBy::Child => Donations::ChildId,
        };

        let query = {
            let mut query = Query::select();
            query
                .expr_as(Expr::col(key), Alias::new("entity_id"))
                .expr_as(Expr::col(Donations::AmountMinor).sum(), Alias::new("total"))
                .expr_as(Expr::col(Donations::Id).count(), Alias::new("donations"))
                .from(Donations::Table)
                .and_where(Expr::col(key).is_not_null());
            if let (GroupBy::Donor, Some(ignored)) = (group_by, filter.ignored_donor.as_deref()) {
                query.and_where(Expr::col(Donations::DonorId).ne(ignored));
            }
            apply_filter(&mut query, filter);
            query
                .group_by_col(key)
                .order_by(Alias::new("total"), Order::Desc)
                .order_by(Alias::new("entity_id"), Order::Asc);
            if let Some(limit) = filter.limit {
                query.limit(limit);
            }
            query.to_string(SqliteQueryBuilder)
        };

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<GroupTotal> {
                Ok(GroupTotal {
                    entity_id: row.try_get("entity_id")?,
                    total_amount: Amount::from_minor_units(row.try_get("total")?),
                    donation_count: row.try_get("donations")?,
                })
            })
            .collect()
    }
}
