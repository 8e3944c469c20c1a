//! ReferralStore interface tests.

use donation_engine::model::{
    Amount, ReferralReward, ReferralStatus, ReferralTracking, RewardTrigger,
};
use donation_engine::storage::Stores;

use super::at;

pub async fn test_tracking_round_trip(stores: &Stores) {
    let click = ReferralTracking::from_click(
        "ref-rt",
        "CODE-RT",
        Some("whatsapp"),
        at(2026, 2, 1, 9),
    );
    stores.referrals.insert_tracking(&click).await.unwrap();

    let loaded = stores
        .referrals
        .get_tracking(&click.id)
        .await
        .unwrap()
        .expect("tracking should exist");
    assert_eq!(loaded, click);
}

pub async fn test_find_pending_click_returns_oldest(stores: &Stores) {
    let older = ReferralTracking::from_click("ref-fp", "CODE-FP", None, at(2026, 2, 1, 9));
    let newer = ReferralTracking::from_click("ref-fp", "CODE-FP", None, at(2026, 2, 1, 10));
    let claimed =
        ReferralTracking::from_registration("ref-fp", "CODE-FP", "user-fp", at(2026, 2, 1, 8));
    for row in [&newer, &claimed, &older] {
        stores.referrals.insert_tracking(row).await.unwrap();
    }

    let found = stores
        .referrals
        .find_pending_click("CODE-FP")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, older.id);

    assert!(stores
        .referrals
        .find_pending_click("CODE-NONE")
        .await
        .unwrap()
        .is_none());
}

pub async fn test_find_by_referred_and_pair(stores: &Stores) {
    let row =
        ReferralTracking::from_registration("ref-fr", "CODE-FR", "user-fr", at(2026, 2, 2, 9));
    stores.referrals.insert_tracking(&row).await.unwrap();

    let by_referred = stores.referrals.find_by_referred("user-fr").await.unwrap().unwrap();
    assert_eq!(by_referred.id, row.id);

    let by_pair = stores
        .referrals
        .find_by_pair("ref-fr", "user-fr")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_pair.id, row.id);
    assert!(stores
        .referrals
        .find_by_pair("ref-other", "user-fr")
        .await
        .unwrap()
        .is_none());
}

pub async fn test_duplicate_pair_conflicts(stores: &Stores) {
    let first =
        ReferralTracking::from_registration("ref-dp", "CODE-DP", "user-dp", at(2026, 2, 3, 9));
    let second =
        ReferralTracking::from_registration("ref-dp", "CODE-DP", "user-dp", at(2026, 2, 3, 10));
    stores.referrals.insert_tracking(&first).await.unwrap();

    let err = stores
        .referrals
        .insert_tracking(&second)
        .await
        .expect_err("same pair should conflict");
    assert!(err.is_conflict(), "expected conflict, got {err:?}");
}

pub async fn test_update_tracking_compare_and_swap(stores: &Stores) {
    let row = ReferralTracking::from_click("ref-cas", "CODE-CAS", None, at(2026, 2, 4, 9));
    stores.referrals.insert_tracking(&row).await.unwrap();

    let mut first = row.clone();
    first.register("user-cas", at(2026, 2, 4, 10)).unwrap();
    let stored = stores.referrals.update_tracking(&first).await.unwrap();
    assert_eq!(stored.version, row.version + 1);
    assert_eq!(stored.status, ReferralStatus::Registered);

    let mut stale = row.clone();
    stale.record_click(at(2026, 2, 4, 11));
    let err = stores
        .referrals
        .update_tracking(&stale)
        .await
        .expect_err("stale version should conflict");
    assert!(err.is_conflict(), "expected conflict, got {err:?}");

    let loaded = stores.referrals.get_tracking(&row.id).await.unwrap().unwrap();
    assert_eq!(loaded, stored);
}

pub async fn test_list_by_referrer_newest_first(stores: &Stores) {
    for hour in [9, 11, 10] {
        let row = ReferralTracking::from_click("ref-list", "CODE-LIST", None, at(2026, 2, 5, hour));
        stores.referrals.insert_tracking(&row).await.unwrap();
    }

    let rows = stores.referrals.list_by_referrer("ref-list", None).await.unwrap();
    let created: Vec<_> = rows.iter().map(|r| r.created_at).collect();
    assert_eq!(
        created,
        vec![at(2026, 2, 5, 11), at(2026, 2, 5, 10), at(2026, 2, 5, 9)]
    );

    let limited = stores.referrals.list_by_referrer("ref-list", Some(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
}

pub async fn test_grant_reward_once_per_trigger(stores: &Stores) {
    let row =
        ReferralTracking::from_registration("ref-rw", "CODE-RW", "user-rw", at(2026, 2, 6, 9));
    stores.referrals.insert_tracking(&row).await.unwrap();

    let trigger = RewardTrigger::Registration;
    let reward = |hour| {
        ReferralReward::awarded(
            &row,
            trigger.reward_type(),
            trigger.value(),
            trigger.description(),
            at(2026, 2, 6, hour),
        )
    };

    assert!(stores.referrals.grant_reward(&reward(10)).await.unwrap());
    assert!(
        !stores.referrals.grant_reward(&reward(11)).await.unwrap(),
        "same trigger is granted once"
    );

    let first_donation = ReferralReward::awarded(
        &row,
        RewardTrigger::FirstDonation.reward_type(),
        RewardTrigger::FirstDonation.value(),
        RewardTrigger::FirstDonation.description(),
        at(2026, 2, 6, 12),
    );
    assert!(stores.referrals.grant_reward(&first_donation).await.unwrap());

    let for_tracking = stores.referrals.rewards_for_tracking(&row.id).await.unwrap();
    assert_eq!(for_tracking.len(), 2);

    let for_user = stores.referrals.rewards_for_user("ref-rw").await.unwrap();
    let descriptions: Vec<&str> = for_user.iter().map(|r| r.description.as_str()).collect();
    assert_eq!(
        descriptions,
        vec!["First donation from referral", "Referral registration bonus"]
    );
}

pub async fn test_referrer_totals_accumulate(stores: &Stores) {
    let empty = stores.referrals.referrer_totals("ref-tot").await.unwrap();
    assert_eq!(empty.referral_count, 0);
    assert_eq!(empty.referral_donations_total, Amount::ZERO);

    stores
        .referrals
        .add_referrer_totals("ref-tot", 1, Amount::ZERO)
        .await
        .unwrap();
    let totals = stores
        .referrals
        .add_referrer_totals("ref-tot", 0, Amount::from_major_units(250))
        .await
        .unwrap();
    assert_eq!(totals.referral_count, 1);
    assert_eq!(totals.referral_donations_total, Amount::from_major_units(250));
    assert_eq!(stores.referrals.referrer_totals("ref-tot").await.unwrap(), totals);
}

pub async fn test_top_referrers_ranked_by_donations(stores: &Stores) {
    let rows = [
        ReferralTracking::from_donation(
            "top-b",
            "CODE-TB",
            Some("u1"),
            Amount::from_major_units(300),
            at(2026, 2, 10, 9),
        ),
        ReferralTracking::from_donation(
            "top-b",
            "CODE-TB",
            Some("u2"),
            Amount::from_major_units(200),
            at(2026, 2, 20, 9),
        ),
        ReferralTracking::from_donation(
            "top-a",
            "CODE-TA",
            Some("u3"),
            Amount::from_major_units(500),
            at(2026, 2, 21, 9),
        ),
        ReferralTracking::from_donation(
            "top-c",
            "CODE-TC",
            Some("u4"),
            Amount::from_major_units(100),
            at(2026, 2, 1, 9),
        ),
    ];
    for row in &rows {
        stores.referrals.insert_tracking(row).await.unwrap();
    }
    // registered but never donated rows do not count
    let idle = ReferralTracking::from_registration("top-c", "CODE-TC", "u5", at(2026, 2, 22, 9));
    stores.referrals.insert_tracking(&idle).await.unwrap();

    let top = stores.referrals.top_referrers(Some(at(2026, 2, 1, 0)), 10).await.unwrap();
    let ours: Vec<_> = top
        .iter()
        .filter(|r| r.user_id.starts_with("top-"))
        .map(|r| (r.user_id.as_str(), r.referral_count, r.total_donations))
        .collect();
    assert_eq!(
        ours,
        vec![
            ("top-a", 1, Amount::from_major_units(500)),
            ("top-b", 2, Amount::from_major_units(500)),
            ("top-c", 1, Amount::from_major_units(100)),
        ],
        "ties are broken by user id"
    );

    let recent = stores.referrals.top_referrers(Some(at(2026, 2, 15, 0)), 10).await.unwrap();
    let b = recent.iter().find(|r| r.user_id == "top-b").unwrap();
    assert_eq!(b.referral_count, 1);
    assert_eq!(b.total_donations, Amount::from_major_units(200));
    assert!(recent.iter().all(|r| r.user_id != "top-c"));
}

#[macro_export]
macro_rules! run_referral_store_tests {
    ($stores:expr) => {
        use $crate::storage::referral_store_tests::*;

        test_tracking_round_trip($stores).await;
        println!("  test_tracking_round_trip: PASSED");

        test_find_pending_click_returns_oldest($stores).await;
        println!("  test_find_pending_click_returns_oldest: PASSED");

        test_find_by_referred_and_pair($stores).await;
        println!("  test_find_by_referred_and_pair: PASSED");

        test_duplicate_pair_conflicts($stores).await;
        println!("  test_duplicate_pair_conflicts: PASSED");

        test_update_tracking_compare_and_swap($stores).await;
        println!("  test_update_tracking_compare_and_swap: PASSED");

        test_list_by_referrer_newest_first($stores).await;
        println!("  test_list_by_referrer_newest_first: PASSED");

        test_grant_reward_once_per_trigger($stores).await;
        println!("  test_grant_reward_once_per_trigger: PASSED");

        test_referrer_totals_accumulate($stores).await;
        println!("  test_referrer_totals_accumulate: PASSED");

        test_top_referrers_ranked_by_donations($stores).await;
        println!("  test_top_referrers_ranked_by_donations: PASSED");
    };
}
