//! Engine behaviour configuration: ingestion defaults, retry policy,
//! leaderboard schedule and milestone table source.

use std::time::Duration;

use serde::Deserialize;

/// Currency applied when a request names none.
pub const DEFAULT_CURRENCY: &str = "HKD";

/// Donation ingestion settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// ISO 4217 code used when the request carries no currency.
    pub default_currency: String,
    /// Donor identity recorded on guest donations. Never counted as a donor.
    pub guest_donor_id: Option<String>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            default_currency: DEFAULT_CURRENCY.to_string(),
            guest_donor_id: None,
        }
    }
}

/// Backoff for write-conflict retries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Retries after the first attempt.
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 10,
            max_delay_ms: 2_000,
            max_attempts: 10,
        }
    }
}

impl RetryConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Leaderboard recompute schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    pub recompute_interval_secs: u64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            recompute_interval_secs: 300,
        }
    }
}

impl LeaderboardConfig {
    pub fn recompute_interval(&self) -> Duration {
        Duration::from_secs(self.recompute_interval_secs)
    }
}

/// Milestone table source. The built-in table is used when `path` is unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MilestoneConfig {
    /// YAML file holding a list of milestones.
    pub path: Option<String>,
}
