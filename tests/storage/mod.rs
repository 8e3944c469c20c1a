//! Shared storage integration tests.
//!
//! Tests the four store interfaces against all implementations.
//! Each backend test binary builds a [`Stores`] and runs these functions
//! through `run_storage_tests!`. Tests share one database per run, so every
//! test uses its own entity ids.

#![allow(dead_code)]

pub mod aggregate_store_tests;
pub mod leaderboard_store_tests;
pub mod ledger_store_tests;
pub mod referral_store_tests;

use chrono::{DateTime, TimeZone, Utc};
use donation_engine::model::{
    Amount, Donation, DonationMode, DonationStatus, DonationTarget,
};

/// Whole-second UTC timestamp, stable across storage round trips.
pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// A completed standard donation to a child.
pub fn donation(
    id: &str,
    donor_id: Option<&str>,
    child_id: &str,
    region_id: &str,
    major_units: i64,
    created_at: DateTime<Utc>,
) -> Donation {
    Donation {
        id: id.to_string(),
        donor_id: donor_id.map(str::to_string),
        child_id: Some(child_id.to_string()),
        region_id: Some(region_id.to_string()),
        amount: Amount::from_major_units(major_units),
        currency: "HKD".to_string(),
        mode: if donor_id.is_some() {
            DonationMode::Standard
        } else {
            DonationMode::Guest
        },
        is_anonymous: donor_id.is_none(),
        referral_code: None,
        transaction_id: None,
        payment_method: None,
        message: None,
        target: DonationTarget::Child,
        status: DonationStatus::Completed,
        created_at,
    }
}

#[macro_export]
macro_rules! run_storage_tests {
    ($stores:expr) => {
        println!("--- LedgerStore ---");
        {
            run_ledger_store_tests!($stores);
        }
        println!("--- AggregateStore ---");
        {
            run_aggregate_store_tests!($stores);
        }
        println!("--- ReferralStore ---");
        {
            run_referral_store_tests!($stores);
        }
        println!("--- LeaderboardStore ---");
        {
            run_leaderboard_store_tests!($stores);
        }
    };
}
