//! donation-engine-scheduler: Leaderboard recompute daemon
//!
//! Recomputes every donor, region and school leaderboard for the current
//! buckets on a fixed interval, reading committed ledger rows from the
//! configured store.
//!
//! ## Configuration
//! - DONATION_ENGINE_CONFIG: Path to the YAML configuration file (optional)
//! - DONATION_ENGINE__LEADERBOARD__RECOMPUTE_INTERVAL_SECS: Recompute interval
//! - DONATION_ENGINE_LOG: Log filter (default: info)
//!
//! The first command-line argument, if given, names a configuration file.

use tracing::info;

use donation_engine::config::Config;
use donation_engine::storage::init_storage;
use donation_engine::utils::bootstrap::{init_tracing, shutdown_signal};
use donation_engine::DonationEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    let stores = init_storage(&config.storage).await?;
    let engine = DonationEngine::from_config(&config, stores)?;

    info!(
        storage = ?config.storage.storage_type,
        interval_secs = config.leaderboard.recompute_interval_secs,
        "donation-engine-scheduler started"
    );

    let passes = engine
        .scheduler(config.leaderboard.recompute_interval())
        .run(shutdown_signal())
        .await;

    info!(passes, "donation-engine-scheduler stopped");
    Ok(())
}
