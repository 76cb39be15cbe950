//! Property-based testing utilities using proptest.
//!
//! [`op_sequence`] generates arbitrary interleavings of lifecycle
//! operations against the three seeded entities of a [`TestHarness`];
//! [`apply`] runs one of them.

use crate::harness::TestHarness;
use chrono::Duration;
use entitlements_core::{EntityRef, PaymentMethod, PurchaseRequest, Result, Tier};
use proptest::prelude::*;

/// One of the seeded entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Profile P1 (bought by `owner`)
    P1,
    /// Profile P2 (bought by `venue_owner` through delegation)
    P2,
    /// Venue V1 (bought by `venue_owner`)
    V1,
}

impl Target {
    /// The entity this target names in `h`.
    #[must_use]
    pub const fn entity(self, h: &TestHarness) -> EntityRef {
        match self {
            Self::P1 => EntityRef::profile(h.p1),
            Self::P2 => EntityRef::profile(h.p2),
            Self::V1 => EntityRef::venue(h.v1),
        }
    }

    /// All targets.
    pub const ALL: [Self; 3] = [Self::P1, Self::P2, Self::V1];
}

/// A lifecycle operation. Indices pick among the records stored so far,
/// modulo their count.
#[derive(Debug, Clone)]
pub enum Op {
    /// Purchase for a target
    Purchase {
        /// Entity
        target: Target,
        /// Tier
        tier: Tier,
        /// Method
        method: PaymentMethod,
    },
    /// Admin verifies a transaction
    Verify(usize),
    /// Verifier settles a transaction with its own reference
    Settle(usize),
    /// Admin rejects a transaction
    Reject(usize),
    /// Admin cancels a subscription
    Cancel(usize),
    /// Clock moves forward
    Advance(i64),
    /// Admin sweeps expired subscriptions
    Sweep,
}

/// Any tier.
pub fn arb_tier() -> impl Strategy<Value = Tier> {
    prop::sample::select(Tier::ALL.to_vec())
}

/// Either method.
pub fn arb_method() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::ManualCash),
        Just(PaymentMethod::InstantQr),
    ]
}

/// Any seeded target.
pub fn arb_target() -> impl Strategy<Value = Target> {
    prop::sample::select(Target::ALL.to_vec())
}

/// One operation, weighted towards purchases and resolutions.
pub fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (arb_target(), arb_tier(), arb_method())
            .prop_map(|(target, tier, method)| Op::Purchase { target, tier, method }),
        3 => any::<usize>().prop_map(Op::Verify),
        2 => any::<usize>().prop_map(Op::Settle),
        2 => any::<usize>().prop_map(Op::Reject),
        2 => any::<usize>().prop_map(Op::Cancel),
        1 => (1i64..=200).prop_map(Op::Advance),
        1 => Just(Op::Sweep),
    ]
}

/// Between one and `max` operations.
pub fn op_sequence(max: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_op(), 1..=max)
}

/// Run one operation as the principal entitled to perform it.
///
/// Ops that pick from an empty record set are no-ops.
///
/// # Errors
///
/// Whatever the orchestrator returns; rejections are expected outcomes.
pub async fn apply(h: &TestHarness, op: &Op) -> Result<()> {
    match *op {
        Op::Purchase {
            target,
            tier,
            method,
        } => {
            let principal = match target {
                Target::P1 => h.owner,
                Target::P2 | Target::V1 => h.venue_owner,
            };
            let request = PurchaseRequest {
                entity: target.entity(h),
                tier,
                method,
            };
            h.orchestrator.purchase(&principal, request).await.map(drop)
        }
        Op::Verify(i) => match pick(&h.entitlements.transactions(), i) {
            Some(txn) => h
                .orchestrator
                .confirm_manual(&h.admin, txn.id, None)
                .await
                .map(drop),
            None => Ok(()),
        },
        Op::Settle(i) => match pick(&h.entitlements.transactions(), i) {
            Some(txn) => {
                let reference = txn.settlement_reference.clone().unwrap_or_default();
                h.orchestrator
                    .confirm_instant(&h.verifier, txn.id, &reference)
                    .await
                    .map(drop)
            }
            None => Ok(()),
        },
        Op::Reject(i) => match pick(&h.entitlements.transactions(), i) {
            Some(txn) => h
                .orchestrator
                .reject(&h.admin, txn.id, "not received")
                .await
                .map(drop),
            None => Ok(()),
        },
        Op::Cancel(i) => match pick(&h.entitlements.subscriptions(), i) {
            Some(sub) => h
                .orchestrator
                .cancel(&h.admin, sub.id, None)
                .await
                .map(drop),
            None => Ok(()),
        },
        Op::Advance(days) => {
            h.clock.advance(Duration::days(days));
            Ok(())
        }
        Op::Sweep => h.orchestrator.sweep_expired(&h.admin).await.map(drop),
    }
}

fn pick<T: Clone>(items: &[T], index: usize) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        items.get(index % items.len()).cloned()
    }
}
