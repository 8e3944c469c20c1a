//! LedgerStore interface tests.

use donation_engine::model::{Amount, DonationStatus, Window};
use donation_engine::storage::{DonationFilter, GroupBy, Stores};

use super::{at, donation};

// =============================================================================
// insert / get
// =============================================================================

pub async fn test_get_nonexistent(stores: &Stores) {
    let result = stores.ledger.get("test_missing").await.expect("get should succeed");
    assert!(result.is_none(), "missing donation should be None");
}

pub async fn test_insert_and_get(stores: &Stores) {
    let mut stored = donation(
        "test_ledger_get",
        Some("donor-1"),
        "child-lg",
        "region-lg",
        250,
        at(2026, 3, 4, 10),
    );
    stored.referral_code = Some("CODE1".to_string());
    stored.message = Some("for school books".to_string());
    stores.ledger.insert(&stored).await.expect("insert should succeed");

    let loaded = stores
        .ledger
        .get("test_ledger_get")
        .await
        .unwrap()
        .expect("donation should exist");
    assert_eq!(loaded, stored);
}

pub async fn test_duplicate_insert_conflicts(stores: &Stores) {
    let first = donation(
        "test_ledger_dup",
        Some("donor-1"),
        "child-ld",
        "region-ld",
        10,
        at(2026, 3, 4, 10),
    );
    stores.ledger.insert(&first).await.unwrap();

    let err = stores.ledger.insert(&first).await.expect_err("duplicate id should fail");
    assert!(err.is_conflict(), "expected conflict, got {err:?}");
}

// =============================================================================
// transition_status
// =============================================================================

pub async fn test_transition_status_is_compare_and_swap(stores: &Stores) {
    let d = donation(
        "test_ledger_cas",
        Some("donor-1"),
        "child-lc",
        "region-lc",
        10,
        at(2026, 3, 4, 10),
    );
    stores.ledger.insert(&d).await.unwrap();

    let moved = stores
        .ledger
        .transition_status(&d.id, DonationStatus::Completed, DonationStatus::Failed)
        .await
        .unwrap();
    assert!(moved);

    let moved_again = stores
        .ledger
        .transition_status(&d.id, DonationStatus::Completed, DonationStatus::Failed)
        .await
        .unwrap();
    assert!(!moved_again, "second swap from completed should lose");

    let loaded = stores.ledger.get(&d.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, DonationStatus::Failed);
}

pub async fn test_transition_status_missing(stores: &Stores) {
    let err = stores
        .ledger
        .transition_status("test_ledger_nope", DonationStatus::Completed, DonationStatus::Failed)
        .await
        .expect_err("missing donation should fail");
    assert!(err.to_string().contains("test_ledger_nope"));
}

// =============================================================================
// list / totals / group_totals
// =============================================================================

pub async fn test_list_filters_and_orders_newest_first(stores: &Stores) {
    let child = "child-list";
    for (id, hour) in [("test_list_a", 8), ("test_list_b", 12), ("test_list_c", 10)] {
        let d = donation(id, Some("donor-list"), child, "region-list", 5, at(2026, 4, 1, hour));
        stores.ledger.insert(&d).await.unwrap();
    }

    let rows = stores
        .ledger
        .list(&DonationFilter::default().child(child))
        .await
        .unwrap();
    let ids: Vec<&str> = rows.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["test_list_b", "test_list_c", "test_list_a"]);

    let limited = stores
        .ledger
        .list(&DonationFilter::default().child(child).limit(1))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, "test_list_b");

    let window = Window {
        start: Some(at(2026, 4, 1, 9)),
        end: Some(at(2026, 4, 1, 12)),
    };
    let windowed = stores
        .ledger
        .list(&DonationFilter::default().child(child).within(window))
        .await
        .unwrap();
    assert_eq!(windowed.len(), 1, "window end is exclusive");
    assert_eq!(windowed[0].id, "test_list_c");
}

pub async fn test_totals_skip_failed_and_ignored_donor(stores: &Stores) {
    let region = "region-totals";
    let rows = [
        donation("test_tot_1", Some("donor-a"), "child-t1", region, 100, at(2026, 5, 1, 9)),
        donation("test_tot_2", Some("donor-a"), "child-t1", region, 50, at(2026, 5, 1, 10)),
        donation("test_tot_3", Some("donor-b"), "child-t2", region, 25, at(2026, 5, 1, 11)),
        donation("test_tot_4", Some("guest"), "child-t2", region, 5, at(2026, 5, 1, 12)),
        donation("test_tot_5", None, "child-t2", region, 1, at(2026, 5, 1, 13)),
    ];
    for d in &rows {
        stores.ledger.insert(d).await.unwrap();
    }
    let mut failed = donation(
        "test_tot_6",
        Some("donor-c"),
        "child-t1",
        region,
        999,
        at(2026, 5, 1, 14),
    );
    failed.status = DonationStatus::Failed;
    stores.ledger.insert(&failed).await.unwrap();

    let totals = stores
        .ledger
        .totals(&DonationFilter::completed().region(region).ignoring_donor(Some("guest")))
        .await
        .unwrap();
    assert_eq!(totals.total_amount, Amount::from_major_units(181));
    assert_eq!(totals.donation_count, 5);
    assert_eq!(totals.unique_donors, 2);

    let empty = stores
        .ledger
        .totals(&DonationFilter::completed().region("region-nobody"))
        .await
        .unwrap();
    assert_eq!(empty.total_amount, Amount::ZERO);
    assert_eq!(empty.donation_count, 0);
    assert_eq!(empty.unique_donors, 0);
}

pub async fn test_group_totals_orders_by_total_then_id(stores: &Stores) {
    let region = "region-group";
    let rows = [
        donation("test_grp_1", Some("grp-b"), "child-g", region, 40, at(2026, 6, 1, 9)),
        donation("test_grp_2", Some("grp-a"), "child-g", region, 40, at(2026, 6, 1, 10)),
        donation("test_grp_3", Some("grp-c"), "child-g", region, 90, at(2026, 6, 1, 11)),
        donation("test_grp_4", Some("grp-guest"), "child-g", region, 500, at(2026, 6, 1, 12)),
        donation("test_grp_5", None, "child-g", region, 700, at(2026, 6, 1, 13)),
    ];
    for d in &rows {
        stores.ledger.insert(d).await.unwrap();
    }

    let groups = stores
        .ledger
        .group_totals(
            GroupBy::Donor,
            &DonationFilter::completed()
                .region(region)
                .ignoring_donor(Some("grp-guest")),
        )
        .await
        .unwrap();
    let ids: Vec<&str> = groups.iter().map(|g| g.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["grp-c", "grp-a", "grp-b"]);
    assert_eq!(groups[0].total_amount, Amount::from_major_units(90));
    assert_eq!(groups[1].donation_count, 1);

    let by_child = stores
        .ledger
        .group_totals(GroupBy::Child, &DonationFilter::completed().region(region))
        .await
        .unwrap();
    assert_eq!(by_child.len(), 1);
    assert_eq!(by_child[0].total_amount, Amount::from_major_units(1370));
    assert_eq!(by_child[0].donation_count, 5);
}

#[macro_export]
macro_rules! run_ledger_store_tests {
    ($stores:expr) => {
        use $crate::storage::ledger_store_tests::*;

        test_get_nonexistent($stores).await;
        println!("  test_get_nonexistent: PASSED");

        test_insert_and_get($stores).await;
        println!("  test_insert_and_get: PASSED");

        test_duplicate_insert_conflicts($stores).await;
        println!("  test_duplicate_insert_conflicts: PASSED");

        test_transition_status_is_compare_and_swap($stores).await;
        println!("  test_transition_status_is_compare_and_swap: PASSED");

        test_transition_status_missing($stores).await;
        println!("  test_transition_status_missing: PASSED");

        test_list_filters_and_orders_newest_first($stores).await;
        println!("  test_list_filters_and_orders_newest_first: PASSED");

        test_totals_skip_failed_and_ignored_donor($stores).await;
        println!("  test_totals_skip_failed_and_ignored_donor: PASSED");

        test_group_totals_orders_by_total_then_id($stores).await;
        println!("  test_group_totals_orders_by_total_then_id: PASSED");
    };
}
