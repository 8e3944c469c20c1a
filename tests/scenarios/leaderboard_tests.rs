//! Leaderboard recompute and lookup through the engine.

use donation_engine::model::{DonationRequest, LeaderboardKind, PeriodKind};
use donation_engine::storage::Stores;

use super::{at, harness, now};

fn ids(entries: &[donation_engine::model::LeaderboardEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.entity_id.as_str()).collect()
}

pub async fn test_donor_ranks_and_ties(stores: Stores) {
    let h = harness(stores).await;
    let engine = &h.engine;

    h.give(DonationRequest::standard("zoe", "child-a", "50")).await;
    h.give(DonationRequest::standard("amy", "child-b", "50")).await;
    h.give(DonationRequest::standard("max", "child-c", "80")).await;
    h.give(DonationRequest::guest("child-a", "500")).await;
    h.give(DonationRequest::quick("900").with_region("islands")).await;

    let summary = engine.recompute_leaderboards().await;
    assert!(summary.failed.is_empty());
    assert_eq!(summary.snapshots, 15);

    let board = engine
        .get_leaderboard(LeaderboardKind::Donor, PeriodKind::Daily, 10, 0)
        .await
        .unwrap();
    assert_eq!(board.bucket_date, now().date_naive());
    assert_eq!(board.total_entries, 3, "guest and quick donations are unranked");
    assert_eq!(ids(&board.entries), ["max", "amy", "zoe"], "ties by id");

    let ranks: Vec<i64> = board.entries.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, [1, 2, 3]);
    assert!(board.entries.iter().all(|e| e.rank_change == 0));

    let page = engine
        .get_leaderboard(LeaderboardKind::Donor, PeriodKind::Daily, 2, 1)
        .await
        .unwrap();
    assert_eq!(page.total_entries, 3);
    assert_eq!(ids(&page.entries), ["amy", "zoe"]);

    let zoe = engine
        .get_ranking(LeaderboardKind::Donor, "zoe", PeriodKind::Daily)
        .await
        .unwrap()
        .expect("zoe is ranked");
    assert_eq!(zoe.rank, 3);
    assert_eq!(zoe.total_amount.to_string(), "50.00");
}

pub async fn test_rank_change_between_buckets(stores: Stores) {
    let h = harness(stores).await;
    let engine = &h.engine;

    let yesterday = at(2026, 10, 18, 12);
    h.give_at(yesterday, DonationRequest::standard("amy", "child-a", "100"))
        .await;
    h.give_at(yesterday, DonationRequest::standard("bob", "child-a", "50"))
        .await;
    engine.recompute_leaderboards().await;

    h.clock.set(now());
    h.give(DonationRequest::standard("bob", "child-a", "90")).await;
    h.give(DonationRequest::standard("cat", "child-a", "20")).await;
    h.give(DonationRequest::standard("amy", "child-a", "10")).await;
    engine.recompute_leaderboards().await;

    let daily = engine
        .get_leaderboard(LeaderboardKind::Donor, PeriodKind::Daily, 10, 0)
        .await
        .unwrap();
    assert_eq!(ids(&daily.entries), ["bob", "cat", "amy"]);
    let changes: Vec<i64> = daily.entries.iter().map(|e| e.rank_change).collect();
    assert_eq!(changes, [1, 0, -2]);

    // all-time has no previous bucket
    let all_time = engine
        .get_leaderboard(LeaderboardKind::Donor, PeriodKind::AllTime, 10, 0)
        .await
        .unwrap();
    assert_eq!(ids(&all_time.entries), ["bob", "amy", "cat"]);
    assert!(all_time.entries.iter().all(|e| e.rank_change == 0));
}

pub async fn test_failed_donation_drops_out(stores: Stores) {
    let h = harness(stores).await;
    let engine = &h.engine;

    h.give(DonationRequest::standard("amy", "child-a", "30")).await;
    let bobs = h.give(DonationRequest::standard("bob", "child-a", "20")).await;
    engine.recompute_leaderboards().await;
    assert!(engine
        .get_ranking(LeaderboardKind::Donor, "bob", PeriodKind::Weekly)
        .await
        .unwrap()
        .is_some());

    engine.mark_failed(&bobs.id).await.unwrap();
    engine.recompute_leaderboards().await;

    let weekly = engine
        .get_leaderboard(LeaderboardKind::Donor, PeriodKind::Weekly, 10, 0)
        .await
        .unwrap();
    assert_eq!(ids(&weekly.entries), ["amy"]);
    assert_eq!(weekly.total_entries, 1);
    assert!(engine
        .get_ranking(LeaderboardKind::Donor, "bob", PeriodKind::Weekly)
        .await
        .unwrap()
        .is_none());
}

pub async fn test_region_and_school_boards(stores: Stores) {
    let h = harness(stores).await;
    let engine = &h.engine;

    h.give(DonationRequest::standard("d1", "child-a", "30")).await;
    h.give(DonationRequest::standard("d2", "child-b", "40")).await;
    h.give(DonationRequest::standard("d3", "child-c", "100")).await;
    h.give(DonationRequest::standard("d4", "child-d", "200")).await;
    engine.recompute_leaderboards().await;

    let regions = engine
        .get_leaderboard(LeaderboardKind::Region, PeriodKind::Monthly, 10, 0)
        .await
        .unwrap();
    assert_eq!(ids(&regions.entries), ["islands", "kowloon", "central"]);
    let names: Vec<_> = regions
        .entries
        .iter()
        .map(|e| e.entity_name.as_deref())
        .collect();
    assert_eq!(names, [Some("Islands"), Some("Kowloon"), Some("Central")]);
    assert_eq!(regions.entries[2].total_amount.to_string(), "70.00");
    assert_eq!(regions.entries[2].donation_count, 2);

    let schools = engine
        .get_leaderboard(LeaderboardKind::School, PeriodKind::Monthly, 10, 0)
        .await
        .unwrap();
    assert_eq!(schools.total_entries, 2, "children without a school are skipped");
    assert_eq!(schools.entries[0].entity_name.as_deref(), Some("Harbour Secondary"));
    assert_eq!(schools.entries[1].entity_name.as_deref(), Some("Hillside Primary"));
    assert_eq!(schools.entries[1].total_amount.to_string(), "70.00");
    assert_eq!(schools.entries[1].donation_count, 2);
}

pub async fn test_empty_board(stores: Stores) {
    let h = harness(stores).await;

    let board = h
        .engine
        .get_leaderboard(LeaderboardKind::Region, PeriodKind::Yearly, 10, 0)
        .await
        .unwrap();
    assert_eq!(board.total_entries, 0);
    assert!(board.entries.is_empty());
    assert_eq!(board.bucket_date, at(2026, 1, 1, 0).date_naive());
}

#[macro_export]
macro_rules! run_leaderboard_tests {
    ($stores:expr) => {
        use $crate::scenarios::leaderboard_tests::*;

        test_donor_ranks_and_ties($stores).await;
        println!("  test_donor_ranks_and_ties: PASSED");

        test_rank_change_between_buckets($stores).await;
        println!("  test_rank_change_between_buckets: PASSED");

        test_failed_donation_drops_out($stores).await;
        println!("  test_failed_donation_drops_out: PASSED");

        test_region_and_school_boards($stores).await;
        println!("  test_region_and_school_boards: PASSED");

        test_empty_board($stores).await;
        println!("  test_empty_board: PASSED");
    };
}
