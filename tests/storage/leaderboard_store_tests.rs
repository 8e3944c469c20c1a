//! LeaderboardStore interface tests.

use chrono::NaiveDate;
use donation_engine::model::{
    Amount, LeaderboardEntry, LeaderboardKey, LeaderboardKind, PeriodKind,
};
use donation_engine::storage::Stores;

use super::at;

fn key(day: u32) -> LeaderboardKey {
    LeaderboardKey::new(
        LeaderboardKind::Region,
        PeriodKind::Daily,
        NaiveDate::from_ymd_opt(2026, 9, day).unwrap(),
    )
}

fn entry(key: LeaderboardKey, entity_id: &str, rank: i64, major_units: i64) -> LeaderboardEntry {
    LeaderboardEntry {
        kind: key.kind,
        period: key.period,
        bucket_date: key.bucket_date,
        entity_id: entity_id.to_string(),
        entity_name: Some(format!("{entity_id} name")),
        rank,
        rank_change: 0,
        total_amount: Amount::from_major_units(major_units),
        donation_count: 1,
        updated_at: at(2026, 9, 1, 0),
    }
}

pub async fn test_missing_snapshot_is_empty(stores: &Stores) {
    let (total, entries) = stores.leaderboards.page(&key(1), 10, 0).await.unwrap();
    assert_eq!(total, 0);
    assert!(entries.is_empty());
    assert!(stores.leaderboards.ranks(&key(1)).await.unwrap().is_empty());
}

pub async fn test_replace_and_page(stores: &Stores) {
    let k = key(2);
    let entries = vec![
        entry(k, "region-c", 3, 10),
        entry(k, "region-a", 1, 30),
        entry(k, "region-b", 2, 20),
    ];
    stores.leaderboards.replace_snapshot(&k, &entries).await.unwrap();

    let (total, page) = stores.leaderboards.page(&k, 2, 0).await.unwrap();
    assert_eq!(total, 3);
    let ids: Vec<&str> = page.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["region-a", "region-b"]);

    let (_, rest) = stores.leaderboards.page(&k, 2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0], entries[0]);

    let ranks = stores.leaderboards.ranks(&k).await.unwrap();
    assert_eq!(ranks.get("region-b"), Some(&2));
}

pub async fn test_replace_drops_stale_entities(stores: &Stores) {
    let k = key(3);
    stores
        .leaderboards
        .replace_snapshot(&k, &[entry(k, "region-old", 1, 50), entry(k, "region-kept", 2, 40)])
        .await
        .unwrap();
    stores
        .leaderboards
        .replace_snapshot(&k, &[entry(k, "region-kept", 1, 60)])
        .await
        .unwrap();

    assert!(stores.leaderboards.entry(&k, "region-old").await.unwrap().is_none());
    let kept = stores.leaderboards.entry(&k, "region-kept").await.unwrap().unwrap();
    assert_eq!(kept.rank, 1);
    assert_eq!(kept.total_amount, Amount::from_major_units(60));
}

pub async fn test_snapshots_are_isolated_by_key(stores: &Stores) {
    let day = key(4);
    let next_day = key(5);
    stores
        .leaderboards
        .replace_snapshot(&day, &[entry(day, "region-iso", 1, 5)])
        .await
        .unwrap();
    stores
        .leaderboards
        .replace_snapshot(&next_day, &[])
        .await
        .unwrap();

    assert!(stores.leaderboards.entry(&day, "region-iso").await.unwrap().is_some());
    assert!(stores.leaderboards.entry(&next_day, "region-iso").await.unwrap().is_none());
}

#[macro_export]
macro_rules! run_leaderboard_store_tests {
    ($stores:expr) => {
        use $crate::storage::leaderboard_store_tests::*;

        test_missing_snapshot_is_empty($stores).await;
        println!("  test_missing_snapshot_is_empty: PASSED");

        test_replace_and_page($stores).await;
        println!("  test_replace_and_page: PASSED");

        test_replace_drops_stale_entities($stores).await;
        println!("  test_replace_drops_stale_entities: PASSED");

        test_snapshots_are_isolated_by_key($stores).await;
        println!("  test_snapshots_are_isolated_by_key: PASSED");
    };
}
