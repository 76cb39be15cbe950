//! Pure transition table for the (Subscription, Transaction) pair.
//!
//! ```text
//!           purchase
//!   (none) ──────────► pending_payment + pending
//!                          │
//!      confirm (cash) ─────┼───── confirm (instant) ───── reject
//!                          ▼                               ▼
//!                   active + completed              failed + failed
//!                          │
//!                       cancel
//!                          ▼
//!                      cancelled
//! ```
//!
//! Planning only decides whether a command applies and which conditional
//! writes it needs. The writes themselves are compare-and-swap operations
//! in the store and ledger, so a plan that was valid when computed can
//! still lose a race and observe `AlreadyResolved` or `StaleState`.

use crate::error::{EntitlementError, Result};
use crate::types::{
    Outcome, PaymentMethod, PaymentStatus, PaymentTransaction, Subscription, SubscriptionStatus,
};
use chrono::{DateTime, Utc};

/// A command that resolves a pending transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settle<'a> {
    /// Administrator attests a cash payment.
    ConfirmManual,
    /// The external verifier reports an instant payment.
    ConfirmInstant {
        /// Reference the payment was received under
        settlement_reference: &'a str,
    },
    /// Administrator rejects the payment.
    Reject {
        /// Why
        reason: &'a str,
    },
}

impl Settle<'_> {
    /// Label for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConfirmManual => "confirm_manual",
            Self::ConfirmInstant { .. } => "confirm_instant",
            Self::Reject { .. } => "reject",
        }
    }
}

/// Conditional writes a command needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairedTransition {
    /// Terminal outcome for the transaction (`pending` → outcome)
    pub outcome: Outcome,
    /// Status the subscription must still hold
    pub expected: SubscriptionStatus,
    /// Status the subscription moves to
    pub target: SubscriptionStatus,
}

/// Plan a settlement command against the current transaction.
///
/// # Errors
///
/// - `InvalidInput` for an empty rejection reason or a settlement
///   reference that does not match
/// - `InvalidMethod` if the command does not apply to the method
/// - `AlreadyResolved` if the transaction is no longer pending
pub fn plan_settlement(command: Settle<'_>, transaction: &PaymentTransaction) -> Result<PairedTransition> {
    match command {
        Settle::ConfirmManual => {
            if transaction.method != PaymentMethod::ManualCash {
                return Err(EntitlementError::InvalidMethod);
            }
        }
        Settle::ConfirmInstant {
            settlement_reference,
        } => {
            if transaction.method != PaymentMethod::InstantQr {
                return Err(EntitlementError::InvalidMethod);
            }
            if transaction.settlement_reference.as_deref() != Some(settlement_reference) {
                return Err(EntitlementError::invalid_input(
                    "settlement reference does not match transaction",
                ));
            }
        }
        Settle::Reject { reason } => {
            if reason.trim().is_empty() {
                return Err(EntitlementError::invalid_input("a rejection reason is required"));
            }
        }
    }

    if transaction.payment_status != PaymentStatus::Pending {
        return Err(EntitlementError::AlreadyResolved);
    }

    let (outcome, target) = match command {
        Settle::ConfirmManual | Settle::ConfirmInstant { .. } => {
            (Outcome::Completed, SubscriptionStatus::Active)
        }
        Settle::Reject { .. } => (Outcome::Failed, SubscriptionStatus::Failed),
    };

    Ok(PairedTransition {
        outcome,
        expected: SubscriptionStatus::PendingPayment,
        target,
    })
}

/// Check a subscription may be cancelled at `now`.
///
/// An active subscription past its expiry reads as expired and can no
/// longer be cancelled.
///
/// # Errors
///
/// Returns `NotActive` unless the effective status is `active`.
pub fn plan_cancel(subscription: &Subscription, now: DateTime<Utc>) -> Result<()> {
    if subscription.effective_status(now) == SubscriptionStatus::Active {
        Ok(())
    } else {
        Err(EntitlementError::NotActive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityId, EntityKind, SubscriptionId, Tier, TransactionId};
    use chrono::Duration;

    fn transaction(method: PaymentMethod, status: PaymentStatus) -> PaymentTransaction {
        PaymentTransaction {
            id: TransactionId::new(),
            subscription_id: SubscriptionId::new(),
            amount: 299,
            currency: "CZK".to_string(),
            method,
            payment_status: status,
            qr_payload: None,
            settlement_reference: (method == PaymentMethod::InstantQr).then(|| "REF-1".to_string()),
            admin_notes: None,
            verified_by: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn test_confirm_manual_activates() {
        let plan = plan_settlement(
            Settle::ConfirmManual,
            &transaction(PaymentMethod::ManualCash, PaymentStatus::Pending),
        );
        assert_eq!(
            plan,
            Ok(PairedTransition {
                outcome: Outcome::Completed,
                expected: SubscriptionStatus::PendingPayment,
                target: SubscriptionStatus::Active,
            })
        );
    }

    #[test]
    fn test_confirm_manual_rejects_instant_method() {
        let plan = plan_settlement(
            Settle::ConfirmManual,
            &transaction(PaymentMethod::InstantQr, PaymentStatus::Pending),
        );
        assert_eq!(plan, Err(EntitlementError::InvalidMethod));
    }

    #[test]
    fn test_method_is_checked_before_resolution() {
        // A resolved instant transaction still reports the method mismatch.
        let plan = plan_settlement(
            Settle::ConfirmManual,
            &transaction(PaymentMethod::InstantQr, PaymentStatus::Completed),
        );
        assert_eq!(plan, Err(EntitlementError::InvalidMethod));
    }

    #[test]
    fn test_resolved_transaction_is_already_resolved() {
        for status in [PaymentStatus::Completed, PaymentStatus::Failed] {
            let txn = transaction(PaymentMethod::ManualCash, status);
            assert_eq!(
                plan_settlement(Settle::ConfirmManual, &txn),
                Err(EntitlementError::AlreadyResolved)
            );
            assert_eq!(
                plan_settlement(Settle::Reject { reason: "no cash" }, &txn),
                Err(EntitlementError::AlreadyResolved)
            );
        }
    }

    #[test]
    fn test_reject_requires_reason() {
        let txn = transaction(PaymentMethod::ManualCash, PaymentStatus::Pending);
        assert!(matches!(
            plan_settlement(Settle::Reject { reason: "   " }, &txn),
            Err(EntitlementError::InvalidInput { .. })
        ));

        let plan = plan_settlement(Settle::Reject { reason: "never paid" }, &txn);
        assert_eq!(plan.map(|p| p.target), Ok(SubscriptionStatus::Failed));
    }

    #[test]
    fn test_confirm_instant_checks_reference() {
        let txn = transaction(PaymentMethod::InstantQr, PaymentStatus::Pending);

        assert!(matches!(
            plan_settlement(
                Settle::ConfirmInstant {
                    settlement_reference: "REF-2"
                },
                &txn
            ),
            Err(EntitlementError::InvalidInput { .. })
        ));
        assert_eq!(
            plan_settlement(
                Settle::ConfirmInstant {
                    settlement_reference: "REF-1"
                },
                &txn
            )
            .map(|p| p.outcome),
            Ok(Outcome::Completed)
        );
    }

    #[test]
    fn test_cancel_requires_effective_active() {
        let now = Utc::now();
        let mut sub = Subscription {
            id: SubscriptionId::new(),
            entity_kind: EntityKind::Venue,
            entity_id: EntityId::new(),
            tier: Tier::Short,
            status: SubscriptionStatus::Active,
            starts_at: now,
            expires_at: now + Duration::days(30),
            price_paid: 499,
            currency: "CZK".to_string(),
            transaction_id: None,
            updated_at: now,
        };

        assert_eq!(plan_cancel(&sub, now), Ok(()));
        assert_eq!(
            plan_cancel(&sub, now + Duration::days(31)),
            Err(EntitlementError::NotActive)
        );

        sub.status = SubscriptionStatus::PendingPayment;
        assert_eq!(plan_cancel(&sub, now), Err(EntitlementError::NotActive));
    }
}
