//! AggregateStore interface tests.
//!
//! Donations are inserted into the ledger before being applied, as the
//! Aggregate Updater does, so unique-donor recounts can see them.

use chrono::NaiveDate;
use donation_engine::model::{Amount, DonationStatus, DonationSummary, PeriodKind, RunningTotal};
use donation_engine::storage::{AggregateDelta, Stores};

use super::{at, donation};

pub async fn test_apply_updates_totals_and_every_bucket(stores: &Stores) {
    let d = donation(
        "test_agg_apply",
        Some("donor-x"),
        "child-agg-1",
        "region-agg-1",
        120,
        at(2026, 7, 15, 9),
    );
    stores.ledger.insert(&d).await.unwrap();

    let applied = stores
        .aggregates
        .apply(&AggregateDelta::apply(&d, None, d.created_at))
        .await
        .unwrap();
    assert!(applied);

    let child = stores.aggregates.child_total("child-agg-1").await.unwrap().unwrap();
    assert_eq!(child.total_amount, Amount::from_major_units(120));
    assert_eq!(child.donation_count, 1);

    let region = stores.aggregates.region_total("region-agg-1").await.unwrap().unwrap();
    assert_eq!(region.total_amount, Amount::from_major_units(120));

    for period in PeriodKind::ALL {
        let bucket = period.bucket_for(d.created_at);
        let summary = stores
            .aggregates
            .summary("region-agg-1", period, bucket)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("missing {period} summary"));
        assert_eq!(summary.total_amount, Amount::from_major_units(120), "{period}");
        assert_eq!(summary.donation_count, 1, "{period}");
        assert_eq!(summary.unique_donors, 1, "{period}");
    }

    let weekly = stores
        .aggregates
        .summary("region-agg-1", PeriodKind::Weekly, NaiveDate::from_ymd_opt(2026, 7, 13).unwrap())
        .await
        .unwrap();
    assert!(weekly.is_some(), "weekly bucket starts on Monday");
}

pub async fn test_apply_is_idempotent(stores: &Stores) {
    let d = donation(
        "test_agg_idem",
        Some("donor-x"),
        "child-agg-2",
        "region-agg-2",
        30,
        at(2026, 7, 15, 9),
    );
    stores.ledger.insert(&d).await.unwrap();
    let delta = AggregateDelta::apply(&d, None, d.created_at);

    assert!(stores.aggregates.apply(&delta).await.unwrap());
    assert!(!stores.aggregates.apply(&delta).await.unwrap(), "second apply is a no-op");

    let child = stores.aggregates.child_total("child-agg-2").await.unwrap().unwrap();
    assert_eq!(child.total_amount, Amount::from_major_units(30));
    assert_eq!(child.donation_count, 1);
}

pub async fn test_revert_undoes_apply_once(stores: &Stores) {
    let kept = donation(
        "test_agg_kept",
        Some("donor-k"),
        "child-agg-3",
        "region-agg-3",
        70,
        at(2026, 7, 16, 9),
    );
    let failed = donation(
        "test_agg_fail",
        Some("donor-f"),
        "child-agg-3",
        "region-agg-3",
        30,
        at(2026, 7, 16, 10),
    );
    for d in [&kept, &failed] {
        stores.ledger.insert(d).await.unwrap();
        stores
            .aggregates
            .apply(&AggregateDelta::apply(d, None, d.created_at))
            .await
            .unwrap();
    }

    stores
        .ledger
        .transition_status(&failed.id, DonationStatus::Completed, DonationStatus::Failed)
        .await
        .unwrap();
    let revert = AggregateDelta::revert(&failed, None, at(2026, 7, 16, 11));
    assert!(stores.aggregates.apply(&revert).await.unwrap());
    assert!(!stores.aggregates.apply(&revert).await.unwrap(), "second revert is a no-op");
    assert!(
        !stores
            .aggregates
            .apply(&AggregateDelta::apply(&failed, None, failed.created_at))
            .await
            .unwrap(),
        "apply after revert is a no-op"
    );

    let child = stores.aggregates.child_total("child-agg-3").await.unwrap().unwrap();
    assert_eq!(child.total_amount, Amount::from_major_units(70));
    assert_eq!(child.donation_count, 1);

    let daily = stores
        .aggregates
        .summary("region-agg-3", PeriodKind::Daily, PeriodKind::Daily.bucket_for(kept.created_at))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(daily.total_amount, Amount::from_major_units(70));
    assert_eq!(daily.donation_count, 1);
    assert_eq!(daily.unique_donors, 1, "failed donor no longer counted");
}

pub async fn test_revert_without_apply_is_noop(stores: &Stores) {
    let d = donation(
        "test_agg_never",
        Some("donor-n"),
        "child-agg-4",
        "region-agg-4",
        10,
        at(2026, 7, 16, 9),
    );
    stores.ledger.insert(&d).await.unwrap();

    let reverted = stores
        .aggregates
        .apply(&AggregateDelta::revert(&d, None, d.created_at))
        .await
        .unwrap();
    assert!(!reverted);
    assert!(stores.aggregates.child_total("child-agg-4").await.unwrap().is_none());
}

pub async fn test_unique_donors_skip_ignored_donor(stores: &Stores) {
    let region = "region-agg-5";
    let rows = [
        donation("test_agg_u1", Some("donor-u1"), "child-agg-5", region, 10, at(2026, 7, 17, 9)),
        donation("test_agg_u2", Some("donor-u1"), "child-agg-5", region, 10, at(2026, 7, 17, 10)),
        donation("test_agg_u3", Some("sentinel"), "child-agg-5", region, 10, at(2026, 7, 17, 11)),
        donation("test_agg_u4", Some("donor-u2"), "child-agg-5", region, 10, at(2026, 7, 17, 12)),
    ];
    for d in &rows {
        stores.ledger.insert(d).await.unwrap();
        stores
            .aggregates
            .apply(&AggregateDelta::apply(d, Some("sentinel"), d.created_at))
            .await
            .unwrap();
    }

    let all_time = stores
        .aggregates
        .summary(region, PeriodKind::AllTime, PeriodKind::AllTime.bucket_for(rows[0].created_at))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(all_time.donation_count, 4);
    assert_eq!(all_time.total_amount, Amount::from_major_units(40));
    assert_eq!(all_time.unique_donors, 2);
}

pub async fn test_summaries_ordered_by_total(stores: &Stores) {
    let bucket_day = at(2026, 8, 3, 9);
    let rows = [
        donation("test_agg_s1", Some("donor-s"), "child-s1", "region-sum-b", 50, bucket_day),
        donation("test_agg_s2", Some("donor-s"), "child-s2", "region-sum-a", 50, bucket_day),
        donation("test_agg_s3", Some("donor-s"), "child-s3", "region-sum-c", 80, bucket_day),
    ];
    for d in &rows {
        stores.ledger.insert(d).await.unwrap();
        stores
            .aggregates
            .apply(&AggregateDelta::apply(d, None, d.created_at))
            .await
            .unwrap();
    }

    let daily = stores
        .aggregates
        .summaries(PeriodKind::Daily, Some(PeriodKind::Daily.bucket_for(bucket_day)))
        .await
        .unwrap();
    let regions: Vec<&str> = daily.iter().map(|s| s.region_id.as_str()).collect();
    assert_eq!(regions, vec!["region-sum-c", "region-sum-a", "region-sum-b"]);

    let region_rows = stores.aggregates.region_summaries("region-sum-c").await.unwrap();
    assert_eq!(region_rows.len(), PeriodKind::ALL.len());
    assert_eq!(region_rows[0].period, PeriodKind::Daily);
}

pub async fn test_replace_region_summaries(stores: &Stores) {
    let region = "region-agg-replace";
    let d = donation("test_agg_r1", Some("donor-r"), "child-r", region, 15, at(2026, 8, 5, 9));
    stores.ledger.insert(&d).await.unwrap();
    stores
        .aggregates
        .apply(&AggregateDelta::apply(&d, None, d.created_at))
        .await
        .unwrap();

    let rebuilt = DonationSummary {
        region_id: region.to_string(),
        period: PeriodKind::AllTime,
        bucket_date: PeriodKind::AllTime.bucket_for(d.created_at),
        total_amount: Amount::from_major_units(15),
        donation_count: 1,
        unique_donors: 1,
        updated_at: at(2026, 8, 6, 0),
    };
    stores
        .aggregates
        .replace_region_summaries(region, std::slice::from_ref(&rebuilt))
        .await
        .unwrap();

    let rows = stores.aggregates.region_summaries(region).await.unwrap();
    assert_eq!(rows, vec![rebuilt]);
}

pub async fn test_set_totals_overwrite(stores: &Stores) {
    let total = RunningTotal {
        entity_id: "child-agg-set".to_string(),
        total_amount: Amount::from_major_units(42),
        donation_count: 3,
        updated_at: at(2026, 8, 7, 0),
    };
    stores.aggregates.set_child_total(&total).await.unwrap();
    let fixed = RunningTotal {
        total_amount: Amount::from_major_units(40),
        donation_count: 2,
        ..total.clone()
    };
    stores.aggregates.set_child_total(&fixed).await.unwrap();
    assert_eq!(
        stores.aggregates.child_total("child-agg-set").await.unwrap(),
        Some(fixed)
    );

    let region = RunningTotal {
        entity_id: "region-agg-set".to_string(),
        ..total
    };
    stores.aggregates.set_region_total(&region).await.unwrap();
    assert_eq!(
        stores.aggregates.region_total("region-agg-set").await.unwrap(),
        Some(region)
    );
}

#[macro_export]
macro_rules! run_aggregate_store_tests {
    ($stores:expr) => {
        use $crate::storage::aggregate_store_tests::*;

        test_apply_updates_totals_and_every_bucket($stores).await;
        println!("  test_apply_updates_totals_and_every_bucket: PASSED");

        test_apply_is_idempotent($stores).await;
        println!("  test_apply_is_idempotent: PASSED");

        test_revert_undoes_apply_once($stores).await;
        println!("  test_revert_undoes_apply_once: PASSED");

        test_revert_without_apply_is_noop($stores).await;
        println!("  test_revert_without_apply_is_noop: PASSED");

        test_unique_donors_skip_ignored_donor($stores).await;
        println!("  test_unique_donors_skip_ignored_donor: PASSED");

        test_summaries_ordered_by_total($stores).await;
        println!("  test_summaries_ordered_by_total: PASSED");

        test_replace_region_summaries($stores).await;
        println!("  test_replace_region_summaries: PASSED");

        test_set_totals_overwrite($stores).await;
        println!("  test_set_totals_overwrite: PASSED");
    };
}
