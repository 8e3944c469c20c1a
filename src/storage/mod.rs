//! Storage interfaces and implementations.
//!
//! Four stores back the engine:
//! - [`LedgerStore`]: immutable donation records
//! - [`AggregateStore`]: child/region running totals and period summaries
//! - [`ReferralStore`]: referral tracking rows, rewards and referrer totals
//! - [`LeaderboardStore`]: ranked snapshots
//!
//! Backends:
//! - `memory`: [`MemoryStore`], always available
//! - `sqlite`: one pool shared by the four SQLite stores (feature `sqlite`)
//!
//! The aggregate store recounts unique donors from the ledger table, so a
//! backend must keep both in the same database.

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageType};
use crate::model::{AmountError, ParseEnumError};

mod aggregate_store;
pub mod helpers;
mod leaderboard_store;
mod ledger_store;
pub mod memory;
mod referral_store;

#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use aggregate_store::{AggregateDelta, AggregateStore, Direction};
pub use leaderboard_store::LeaderboardStore;
pub use ledger_store::{DonationFilter, GroupBy, LedgerStore};
pub use memory::MemoryStore;
pub use referral_store::{ReferralStore, ReferrerActivity};

#[cfg(feature = "sqlite")]
pub use sqlite::{
    SqliteAggregateStore, SqliteLeaderboardStore, SqliteLedgerStore, SqliteReferralStore,
};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Lost a race: stale version, unique-key collision or a locked database.
    /// Safe to retry.
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StorageError {
    /// Whether the failed operation may succeed if retried.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        // SQLITE_BUSY and SQLITE_LOCKED with their extended codes
        const RETRYABLE_CODES: [&str; 5] = ["5", "6", "261", "262", "517"];

        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StorageError::Conflict(db.message().to_string());
            }
            if db
                .code()
                .is_some_and(|code| RETRYABLE_CODES.contains(&code.as_ref()))
            {
                return StorageError::Conflict(db.message().to_string());
            }
        }
        StorageError::Database(e)
    }
}

impl From<ParseEnumError> for StorageError {
    fn from(e: ParseEnumError) -> Self {
        StorageError::InvalidData(e.to_string())
    }
}

impl From<AmountError> for StorageError {
    fn from(e: AmountError) -> Self {
        StorageError::InvalidData(e.to_string())
    }
}

impl From<chrono::ParseError> for StorageError {
    fn from(e: chrono::ParseError) -> Self {
        StorageError::InvalidData(e.to_string())
    }
}

/// The four stores the engine needs, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn LedgerStore>,
    pub aggregates: Arc<dyn AggregateStore>,
    pub referrals: Arc<dyn ReferralStore>,
    pub leaderboards: Arc<dyn LeaderboardStore>,
}

impl Stores {
    /// All four stores backed by one in-memory store.
    pub fn memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    /// All four stores backed by `store`. Keep a clone of the `Arc` to reach
    /// the failure toggles in tests.
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            ledger: store.clone(),
            aggregates: store.clone(),
            referrals: store.clone(),
            leaderboards: store,
        }
    }

    /// All four SQLite stores over one pool, with tables created.
    #[cfg(feature = "sqlite")]
    pub async fn sqlite(pool: sqlx::SqlitePool) -> Result<Self> {
        let ledger = SqliteLedgerStore::new(pool.clone());
        ledger.init().await?;
        let aggregates = SqliteAggregateStore::new(pool.clone());
        aggregates.init().await?;
        let referrals = SqliteReferralStore::new(pool.clone());
        referrals.init().await?;
        let leaderboards = SqliteLeaderboardStore::new(pool);
        leaderboards.init().await?;

        Ok(Self {
            ledger: Arc::new(ledger),
            aggregates: Arc::new(aggregates),
            referrals: Arc::new(referrals),
            leaderboards: Arc::new(leaderboards),
        })
    }
}

/// Initialize storage based on configuration.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<Stores, Box<dyn std::error::Error>> {
    info!("Storage: {:?} at {}", config.storage_type, config.path);

    match config.storage_type {
        StorageType::Memory => Ok(Stores::memory()),
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            let pool = sqlite::open_pool(&config.path).await?;
            Ok(Stores::sqlite(pool).await?)
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err("SQLite feature not enabled".into())
        }
    }
}
