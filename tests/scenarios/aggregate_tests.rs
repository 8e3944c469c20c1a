//! Aggregate counters and period summaries through the engine.

use chrono::Utc;
use futures::future::join_all;

use donation_engine::model::{Amount, DonationRequest, PeriodKind, RunningTotal};
use donation_engine::storage::Stores;

use super::{at, harness, now};

pub async fn test_concurrent_recordings_keep_totals(stores: Stores) {
    let h = harness(stores).await;

    let requests: Vec<DonationRequest> = (1..=20)
        .map(|i| {
            DonationRequest::standard(format!("donor-{}", i % 4), "child-a", i.to_string())
        })
        .collect();
    let results = join_all(requests.iter().map(|r| h.engine.record_donation(r))).await;
    assert!(results.iter().all(|r| r.is_ok()));

    // 1 + 2 + ... + 20
    let expected = Amount::from_major_units(210);
    let child = h.engine.child_total("child-a").await.unwrap();
    assert_eq!(child.total_amount, expected);
    assert_eq!(child.donation_count, 20);

    let ledger = h.engine.get_totals(None, Some("child-a")).await.unwrap();
    assert_eq!(ledger.total_amount, child.total_amount);
    assert_eq!(ledger.donation_count, child.donation_count);

    let region = h.engine.region_total("central").await.unwrap();
    assert_eq!(region.total_amount, expected);

    for period in PeriodKind::ALL {
        let summary = h
            .engine
            .get_region_period_summary("central", period)
            .await
            .unwrap();
        assert_eq!(summary.total_amount, expected, "{period}");
        assert_eq!(summary.donation_count, 20, "{period}");
        assert_eq!(summary.unique_donors, 4, "{period}");
    }
}

pub async fn test_buckets_sum_to_region_total(stores: Stores) {
    let h = harness(stores).await;

    let dated = [
        (at(2025, 12, 31, 22), "15"),
        (at(2026, 1, 5, 9), "20"),
        (at(2026, 1, 7, 18), "30"),
        (at(2026, 2, 10, 12), "45.25"),
        (now(), "100"),
    ];
    for (when, amount) in dated {
        h.give_at(when, DonationRequest::standard("donor-1", "child-b", amount))
            .await;
    }
    h.clock.set(now());

    let region = h.engine.region_total("central").await.unwrap();
    assert_eq!(region.total_amount.to_string(), "210.25");

    let summaries = h
        .engine
        .stores()
        .aggregates
        .region_summaries("central")
        .await
        .unwrap();
    for period in PeriodKind::ALL {
        let rows: Vec<_> = summaries.iter().filter(|s| s.period == period).collect();
        let sum: Amount = rows.iter().map(|s| s.total_amount).sum();
        let count: i64 = rows.iter().map(|s| s.donation_count).sum();
        assert_eq!(sum, region.total_amount, "{period}");
        assert_eq!(count, 5, "{period}");
    }

    let yearly = summaries
        .iter()
        .filter(|s| s.period == PeriodKind::Yearly)
        .count();
    assert_eq!(yearly, 2);
    // 2026-01-05 and 2026-01-07 share the week starting Monday the 5th
    let weekly = summaries
        .iter()
        .filter(|s| s.period == PeriodKind::Weekly)
        .count();
    assert_eq!(weekly, 4);

    let listed = h
        .engine
        .list_region_summaries(PeriodKind::Yearly)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].total_amount.to_string(), "195.25");
}

pub async fn test_unique_donors_per_bucket(stores: Stores) {
    let h = harness(stores).await;

    h.give(DonationRequest::standard("donor-1", "child-a", "10")).await;
    h.give(DonationRequest::standard("donor-1", "child-b", "10")).await;
    h.give(DonationRequest::standard("donor-2", "child-a", "10")).await;
    h.give(DonationRequest::guest("child-a", "10")).await;
    h.give(DonationRequest::quick("10").with_region("central")).await;

    let summary = h
        .engine
        .get_region_period_summary("central", PeriodKind::Daily)
        .await
        .unwrap();
    assert_eq!(summary.donation_count, 5);
    assert_eq!(summary.total_amount, Amount::from_major_units(50));
    assert_eq!(summary.unique_donors, 2);

    let empty = h
        .engine
        .get_region_period_summary("islands", PeriodKind::Daily)
        .await
        .unwrap();
    assert_eq!(empty.total_amount, Amount::ZERO);
    assert_eq!(empty.donation_count, 0);
    assert_eq!(empty.bucket_date, now().date_naive());
}

pub async fn test_resync_repairs_drift(stores: Stores) {
    let h = harness(stores).await;

    h.give(DonationRequest::standard("donor-1", "child-a", "70")).await;
    h.give(DonationRequest::standard("donor-2", "child-b", "30")).await;

    let aggregates = &h.engine.stores().aggregates;
    let drifted = RunningTotal {
        entity_id: "child-a".to_string(),
        total_amount: Amount::from_major_units(9_999),
        donation_count: 42,
        updated_at: Utc::now(),
    };
    aggregates.set_child_total(&drifted).await.unwrap();
    aggregates
        .set_region_total(&RunningTotal {
            entity_id: "central".to_string(),
            ..drifted
        })
        .await
        .unwrap();

    let child = h.engine.resync_child("child-a").await.unwrap();
    assert_eq!(child.total_amount, Amount::from_major_units(70));
    assert_eq!(child.donation_count, 1);
    assert_eq!(h.engine.child_total("child-a").await.unwrap(), child);

    let region = h.engine.resync_region("central").await.unwrap();
    assert_eq!(region.total_amount, Amount::from_major_units(100));
    assert_eq!(region.donation_count, 2);

    let before = h
        .engine
        .get_region_period_summary("central", PeriodKind::Weekly)
        .await
        .unwrap();
    let rebuilt = h.engine.rebuild_region_summaries("central").await.unwrap();
    assert_eq!(rebuilt.len(), PeriodKind::ALL.len());
    let after = h
        .engine
        .get_region_period_summary("central", PeriodKind::Weekly)
        .await
        .unwrap();
    assert_eq!(after.total_amount, before.total_amount);
    assert_eq!(after.donation_count, before.donation_count);
    assert_eq!(after.unique_donors, 2);
}

#[macro_export]
macro_rules! run_aggregate_tests {
    ($stores:expr) => {
        use $crate::scenarios::aggregate_tests::*;

        test_concurrent_recordings_keep_totals($stores).await;
        println!("  test_concurrent_recordings_keep_totals: PASSED");

        test_buckets_sum_to_region_total($stores).await;
        println!("  test_buckets_sum_to_region_total: PASSED");

        test_unique_donors_per_bucket($stores).await;
        println!("  test_unique_donors_per_bucket: PASSED");

        test_resync_repairs_drift($stores).await;
        println!("  test_resync_repairs_drift: PASSED");
    };
}
