//! End-to-end scenarios through the `DonationEngine` facade.
//!
//! Each backend test binary runs these through `run_engine_tests!`, handing
//! every scenario a fresh, empty [`Stores`].

#![allow(dead_code)]

pub mod aggregate_tests;
pub mod leaderboard_tests;
pub mod milestone_tests;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use donation_engine::config::Config;
use donation_engine::discovery::StaticDirectory;
use donation_engine::model::{Donation, DonationRequest};
use donation_engine::storage::Stores;
use donation_engine::utils::ManualClock;
use donation_engine::DonationEngine;

/// Donor identity recorded on guest donations.
pub const GUEST: &str = "guest-donor";

/// Monday 2026-10-19, 10:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub struct Harness {
    pub engine: DonationEngine,
    pub clock: Arc<ManualClock>,
    pub directory: Arc<StaticDirectory>,
}

impl Harness {
    /// Record a donation that must succeed.
    pub async fn give(&self, request: DonationRequest) -> Donation {
        self.engine
            .record_donation(&request)
            .await
            .expect("donation should be recorded")
    }

    pub async fn give_at(&self, when: DateTime<Utc>, request: DonationRequest) -> Donation {
        self.clock.set(when);
        self.give(request).await
    }
}

/// An engine over `stores` with a seeded directory and a clock fixed at
/// [`now`].
///
/// Regions: central, kowloon, islands. Children: child-a and child-b
/// (central, Hillside Primary), child-c (kowloon, Harbour Secondary),
/// child-d (islands, no school). Codes: ALICE -> alice, BOB -> bob.
pub async fn harness(stores: Stores) -> Harness {
    let directory = Arc::new(StaticDirectory::new());
    directory.register_region("central", "Central").await;
    directory.register_region("kowloon", "Kowloon").await;
    directory.register_region("islands", "Islands").await;
    directory
        .register_child("child-a", "central", Some("Hillside Primary"))
        .await;
    directory
        .register_child("child-b", "central", Some("Hillside Primary"))
        .await;
    directory
        .register_child("child-c", "kowloon", Some("Harbour Secondary"))
        .await;
    directory.register_child("child-d", "islands", None).await;
    directory.register_referral_code("ALICE", "alice").await;
    directory.register_referral_code("BOB", "bob").await;

    let mut config = Config::for_test();
    config.ingestion.guest_donor_id = Some(GUEST.to_string());

    let clock = Arc::new(ManualClock::new(now()));
    let engine = DonationEngine::new(&config, stores, directory.clone(), directory.clone())
        .with_clock(clock.clone());

    Harness {
        engine,
        clock,
        directory,
    }
}

#[macro_export]
macro_rules! run_engine_tests {
    ($stores:expr) => {
        println!("--- Ingestion ---");
        {
            run_ingestion_tests!($stores);
        }
        println!("--- Aggregates ---");
        {
            run_aggregate_tests!($stores);
        }
        println!("--- Referrals ---");
        {
            run_referral_tests!($stores);
        }
        println!("--- Leaderboards ---");
        {
            run_leaderboard_tests!($stores);
        }
        println!("--- Milestones ---");
        {
            run_milestone_tests!($stores);
        }
    };
}
