//! End-to-end lifecycle scenarios and invariant properties over the
//! in-memory harness.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::Duration;
use entitlements_core::{
    EntitlementError, EntityRef, PaymentMethod, PaymentStatus, PurchaseRequest,
    SubscriptionStatus, Tier,
};
use entitlements_testing::TestHarness;
use entitlements_testing::properties::{Op, Target, apply, arb_method, op_sequence};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_a_manual_purchase_is_pending() {
    let h = TestHarness::new();

    let purchase = h.purchase_p1(PaymentMethod::ManualCash).await.unwrap();

    assert_eq!(purchase.subscription.status, SubscriptionStatus::PendingPayment);
    assert_eq!(purchase.subscription.price_paid, 299);
    assert_eq!(
        purchase.subscription.expires_at - purchase.subscription.starts_at,
        Duration::days(30)
    );
    assert_eq!(purchase.transaction.payment_status, PaymentStatus::Pending);
    assert_eq!(purchase.transaction.subscription_id, purchase.subscription.id);
    assert_eq!(purchase.subscription.transaction_id, Some(purchase.transaction.id));
}

#[tokio::test]
async fn scenario_b_second_purchase_conflicts() {
    let h = TestHarness::new();
    h.purchase_p1(PaymentMethod::ManualCash).await.unwrap();

    let second = h.purchase_p1(PaymentMethod::InstantQr).await;

    assert_eq!(second.unwrap_err(), EntitlementError::Conflict);
    assert_eq!(h.entitlements.subscription_count(), 1);
}

#[tokio::test]
async fn scenario_c_manual_verify_of_instant_transaction_is_invalid_method() {
    let h = TestHarness::new();
    let instant = h
        .orchestrator
        .purchase(
            &h.venue_owner,
            PurchaseRequest {
                entity: EntityRef::venue(h.v1),
                tier: Tier::Medium,
                method: PaymentMethod::InstantQr,
            },
        )
        .await
        .unwrap();
    assert!(instant.transaction.qr_payload.is_some());

    let result = h
        .orchestrator
        .confirm_manual(&h.admin, instant.transaction.id, None)
        .await;

    assert_eq!(result.unwrap_err(), EntitlementError::InvalidMethod);
    let txn = &h.entitlements.transactions()[0];
    assert_eq!(txn.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn scenario_d_e_verify_activates_once() {
    let h = TestHarness::new();
    let purchase = h.purchase_p1(PaymentMethod::ManualCash).await.unwrap();

    let settled = h
        .orchestrator
        .confirm_manual(&h.admin, purchase.transaction.id, Some("cash at desk".into()))
        .await
        .unwrap();

    assert!(settled.consistent);
    let subscription = settled.subscription.unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(subscription.expires_at, subscription.starts_at + Duration::days(30));
    assert_eq!(settled.transaction.payment_status, PaymentStatus::Completed);
    assert_eq!(settled.transaction.verified_by, Some(h.admin.id));
    assert_eq!(settled.transaction.admin_notes.as_deref(), Some("cash at desk"));

    let again = h
        .orchestrator
        .confirm_manual(&h.admin, purchase.transaction.id, None)
        .await;
    assert_eq!(again.unwrap_err(), EntitlementError::AlreadyResolved);
}

#[tokio::test]
async fn scenario_f_owner_cancels_once() {
    let h = TestHarness::new();
    let active = h.active_p1().await.unwrap();

    let cancelled = h
        .orchestrator
        .cancel(&h.owner, active.subscription.id, Some(entitlements_core::EntityKind::Profile))
        .await
        .unwrap();
    assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);

    let again = h
        .orchestrator
        .cancel(&h.owner, active.subscription.id, None)
        .await;
    assert_eq!(again.unwrap_err(), EntitlementError::NotActive);

    // The entity is free again.
    h.purchase_p1(PaymentMethod::ManualCash).await.unwrap();
}

#[tokio::test]
async fn delegated_venue_owner_buys_for_worker_profile() {
    let h = TestHarness::new();

    let purchase = h
        .orchestrator
        .purchase(
            &h.venue_owner,
            PurchaseRequest {
                entity: EntityRef::profile(h.p2),
                tier: Tier::Long,
                method: PaymentMethod::ManualCash,
            },
        )
        .await
        .unwrap();
    assert_eq!(purchase.subscription.price_paid, 1499);

    let worker_view = h.orchestrator.subscriptions_for(&h.worker).await.unwrap();
    assert_eq!(worker_view.len(), 1);

    let stranger = h
        .orchestrator
        .subscription_detail(&h.stranger, purchase.subscription.id)
        .await;
    assert_eq!(stranger.unwrap_err(), EntitlementError::Forbidden);
}

#[tokio::test]
async fn transaction_failure_leaves_no_pending_row() {
    let h = TestHarness::new();
    h.entitlements.fail_next_transaction_create();

    let result = h.purchase_p1(PaymentMethod::ManualCash).await;

    assert!(matches!(result, Err(EntitlementError::TransactionCreateFailed(_))));
    assert_eq!(h.live_count(EntityRef::profile(h.p1)), 0);
    assert!(h.notifier.sent().is_empty());

    // Nothing blocks a retry.
    h.purchase_p1(PaymentMethod::ManualCash).await.unwrap();
}

#[tokio::test]
async fn service_principal_settles_instant_payment() {
    let h = TestHarness::new();
    let purchase = h.purchase_p1(PaymentMethod::InstantQr).await.unwrap();
    let reference = purchase.transaction.settlement_reference.clone().unwrap();

    let member = h
        .orchestrator
        .confirm_instant(&h.owner, purchase.transaction.id, &reference)
        .await;
    assert_eq!(member.unwrap_err(), EntitlementError::Forbidden);

    let settled = h
        .orchestrator
        .confirm_instant(&h.verifier, purchase.transaction.id, &reference)
        .await
        .unwrap();
    assert_eq!(settled.subscription.unwrap().status, SubscriptionStatus::Active);
    assert_eq!(h.notifier.kinds(), vec!["purchased", "confirmed"]);
}

#[tokio::test]
async fn renewal_after_lapse_succeeds_without_sweep() {
    let h = TestHarness::new();
    let first = h.active_p1().await.unwrap();

    h.clock.advance(Duration::days(31));
    let vip = h.orchestrator.vip_status(EntityRef::profile(h.p1)).await.unwrap();
    assert!(!vip.vip);

    let renewal = h.purchase_p1(PaymentMethod::ManualCash).await.unwrap();
    assert_eq!(renewal.subscription.status, SubscriptionStatus::PendingPayment);
    assert_eq!(h.live_count(EntityRef::profile(h.p1)), 1);

    let views = h.orchestrator.subscriptions_for(&h.owner).await.unwrap();
    let lapsed = views.iter().find(|v| v.subscription.id == first.subscription.id).unwrap();
    assert_eq!(lapsed.subscription.status, SubscriptionStatus::Expired);

    // Nothing left for the sweep.
    assert_eq!(h.orchestrator.sweep_expired(&h.admin).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn assert_paired(h: &TestHarness) {
    let subscriptions = h.entitlements.subscriptions();
    for txn in h.entitlements.transactions() {
        let sub = subscriptions
            .iter()
            .find(|s| s.id == txn.subscription_id)
            .unwrap();
        let paired = match txn.payment_status {
            PaymentStatus::Pending => sub.status == SubscriptionStatus::PendingPayment,
            PaymentStatus::Failed => sub.status == SubscriptionStatus::Failed,
            PaymentStatus::Completed => matches!(
                sub.status,
                SubscriptionStatus::Active
                    | SubscriptionStatus::Cancelled
                    | SubscriptionStatus::Expired
            ),
        };
        assert!(paired, "transaction {:?} paired with {:?}", txn.payment_status, sub.status);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// No entity ever holds two live subscriptions, and every transaction
    /// agrees with its subscription.
    #[test]
    fn at_most_one_live_subscription_per_entity(ops in op_sequence(40)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = TestHarness::new();

            for op in &ops {
                // Rejections are expected; only the invariants matter.
                let _ = apply(&h, op).await;

                for target in Target::ALL {
                    prop_assert!(h.live_count(target.entity(&h)) <= 1, "after {:?}", op);
                }
                assert_paired(&h);
            }
            Ok(())
        })?;
    }

    /// Whatever mix of verify and reject arrives, exactly the first wins.
    #[test]
    fn resolution_succeeds_exactly_once(verifies in prop::collection::vec(any::<bool>(), 2..6)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = TestHarness::new();
            let purchase = h.purchase_p1(PaymentMethod::ManualCash).await.unwrap();
            let id = purchase.transaction.id;

            for (i, verify) in verifies.iter().enumerate() {
                let result = if *verify {
                    h.orchestrator.confirm_manual(&h.admin, id, None).await
                } else {
                    h.orchestrator.reject(&h.admin, id, "no cash").await
                };

                if i == 0 {
                    prop_assert!(result.is_ok());
                } else {
                    prop_assert_eq!(result.unwrap_err(), EntitlementError::AlreadyResolved);
                }
            }

            let expected = if verifies[0] {
                SubscriptionStatus::Active
            } else {
                SubscriptionStatus::Failed
            };
            prop_assert_eq!(h.entitlements.subscriptions()[0].status, expected);
            Ok(())
        })?;
    }

    /// Purchases through either method leave a pending pair.
    #[test]
    fn purchase_leaves_pending_pair(method in arb_method()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = TestHarness::new();
            apply(&h, &Op::Purchase { target: Target::V1, tier: Tier::Short, method })
                .await
                .unwrap();

            prop_assert_eq!(h.live_count(EntityRef::venue(h.v1)), 1);
            assert_paired(&h);
            Ok(())
        })?;
    }
}
