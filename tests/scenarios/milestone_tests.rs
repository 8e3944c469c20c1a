//! Milestone progress over ledger totals.

use rust_decimal_macros::dec;

use donation_engine::model::{Amount, Applicability, DonationRequest};
use donation_engine::storage::Stores;
use donation_engine::EngineError;

use super::harness;

pub async fn test_donor_progress_follows_completed_giving(stores: Stores) {
    let h = harness(stores).await;
    let engine = &h.engine;

    let big = h.give(DonationRequest::standard("mia", "child-a", "600")).await;
    h.give(DonationRequest::standard("mia", "child-c", "150")).await;

    let progress = engine.donor_milestone_progress("mia").await.unwrap();
    assert_eq!(progress.total_amount, Amount::from_major_units(750));
    assert_eq!(progress.current.as_ref().unwrap().id, "supporter");
    assert_eq!(progress.achieved_count, 2);
    let next = progress.next.unwrap();
    assert_eq!(next.milestone.id, "contributor");
    assert_eq!(next.amount_needed, Amount::from_major_units(250));
    assert!((next.progress_percentage - 75.0).abs() < 1e-9);

    engine.mark_failed(&big.id).await.unwrap();
    let progress = engine.donor_milestone_progress("mia").await.unwrap();
    assert_eq!(progress.total_amount, Amount::from_major_units(150));
    assert_eq!(progress.current.unwrap().id, "first-step");
    assert_eq!(progress.next.unwrap().amount_needed, Amount::from_major_units(350));

    let nobody = engine.donor_milestone_progress("nobody").await.unwrap();
    assert_eq!(nobody.current, None);
    assert_eq!(nobody.achieved_count, 0);
    assert_eq!(nobody.next.unwrap().milestone.id, "first-step");
}

pub async fn test_region_progress(stores: Stores) {
    let h = harness(stores).await;

    h.give(DonationRequest::standard("d1", "child-a", "50000")).await;

    let progress = h.engine.region_milestone_progress("central").await.unwrap();
    assert_eq!(progress.total_milestones, 1);
    assert_eq!(progress.current, None);
    let next = progress.next.unwrap();
    assert_eq!(next.milestone.name, "Central Region Milestone");
    assert_eq!(next.amount_needed, Amount::from_major_units(50_000));
    assert!((next.progress_percentage - 50.0).abs() < 1e-9);
}

pub async fn test_milestone_lookup(stores: Stores) {
    let h = harness(stores).await;
    let engine = &h.engine;

    let hero = engine.milestone_by_id("hero").unwrap();
    assert_eq!(hero.threshold, Amount::from_major_units(10_000));
    assert!(matches!(
        engine.milestone_by_id("nope"),
        Err(EngineError::NotFound { kind: "milestone", .. })
    ));

    let total = Amount::try_from(dec!(2500.00)).unwrap();
    let progress = engine.get_milestone_progress(total, Applicability::User);
    // thresholds are inclusive
    assert_eq!(progress.current.unwrap().id, "benefactor");
    assert_eq!(progress.achieved_count, 4);
    assert!((progress.completion_percentage - 50.0).abs() < 1e-9);
}

#[macro_export]
macro_rules! run_milestone_tests {
    ($stores:expr) => {
        use $crate::scenarios::milestone_tests::*;

        test_donor_progress_follows_completed_giving($stores).await;
        println!("  test_donor_progress_follows_completed_giving: PASSED");

        test_region_progress($stores).await;
        println!("  test_region_progress: PASSED");

        test_milestone_lookup($stores).await;
        println!("  test_milestone_lookup: PASSED");
    };
}
