//! Lifecycle orchestrator.
//!
//! Ties the providers together into the purchase saga and the paired
//! resolution of a transaction and its subscription.
//!
//! # Purchase saga
//!
//! ```text
//! authorize ─► has_active_or_pending ─► quote ─► store.create (step 1)
//!                    │ lapsed active row
//!                    ▼
//!              store.transition_to(expired)
//!                                                     │
//!                         ┌───────────────────────────┤
//!                         ▼                           ▼
//!                  [instant] qr.issue ──fail──► compensate: store.delete
//!                         │                           ▲
//!                         ▼                           │
//!                  ledger.create (step 2) ──fail──────┘
//!                         │
//!                         ▼
//!                  store.link_transaction ─► notify
//! ```
//!
//! The compensation is attempted once. If it fails the orphan stays in
//! `pending_payment` and is logged with `inconsistency = "orphan_subscription"`.
//!
//! # Paired resolution
//!
//! Confirm and reject resolve the transaction first (compare-and-swap on
//! `pending`), then move the subscription (compare-and-swap on
//! `pending_payment`). If the second step finds the subscription changed
//! under it, the resolved payment is kept and the divergence is logged
//! with `inconsistency = "resolution_diverged"`; it is never reverted.

use crate::environment::Clock;
use crate::error::{EntitlementError, Result};
use crate::lifecycle::{self, Settle};
use crate::metrics;
use crate::ownership::{Action, OwnershipVerifier};
use crate::pricing::{PricingCatalog, Quote};
use crate::providers::{
    EntitlementStore, Notification, NotificationSink, QrError, QrPaymentService, QrRequest,
    TransactionLedger,
};
use crate::types::{
    EntityId, EntityKind, EntityRef, MethodPayload, NewSubscription, NewTransaction,
    PaymentMethod, PaymentTransaction, Principal, Resolution, Subscription, SubscriptionId,
    SubscriptionStatus, SubscriptionView, Tier, TransactionFilter, TransactionId,
    TransactionListing,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Everything the orchestrator talks to.
#[derive(Clone)]
pub struct LifecycleEnvironment {
    /// Subscription store
    pub store: Arc<dyn EntitlementStore>,
    /// Payment transaction ledger
    pub ledger: Arc<dyn TransactionLedger>,
    /// Ownership resolver chain
    pub verifier: OwnershipVerifier,
    /// Price table
    pub catalog: PricingCatalog,
    /// Instant-payment QR issuer
    pub qr: Arc<dyn QrPaymentService>,
    /// Lifecycle notifications
    pub notifier: Arc<dyn NotificationSink>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

/// Purchase input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PurchaseRequest {
    /// Entity to entitle
    pub entity: EntityRef,
    /// Tier to buy
    pub tier: Tier,
    /// Settlement method
    pub method: PaymentMethod,
}

/// A successful purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Purchase {
    /// New subscription in `pending_payment`
    pub subscription: Subscription,
    /// Its transaction in `pending`
    pub transaction: PaymentTransaction,
}

/// Result of a confirm or reject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Settlement {
    /// Subscription as it stands after the operation
    pub subscription: Option<Subscription>,
    /// Resolved transaction
    pub transaction: PaymentTransaction,
    /// `false` when the subscription could not follow the transaction
    pub consistent: bool,
}

/// A subscription with its transaction, for detail views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubscriptionDetail {
    /// Subscription with read-time status
    pub subscription: SubscriptionView,
    /// Linked transaction, if created
    pub transaction: Option<PaymentTransaction>,
}

/// Public VIP check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VipStatus {
    /// Entity kind
    pub entity_kind: EntityKind,
    /// Entity id
    pub entity_id: EntityId,
    /// Whether the boost is in force
    pub vip: bool,
    /// When it ends, if in force
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// The entitlement saga and state machine.
#[derive(Clone)]
pub struct LifecycleOrchestrator {
    env: LifecycleEnvironment,
}

impl LifecycleOrchestrator {
    /// Orchestrator over `env`.
    #[must_use]
    pub const fn new(env: LifecycleEnvironment) -> Self {
        Self { env }
    }

    /// Environment accessor.
    #[must_use]
    pub const fn environment(&self) -> &LifecycleEnvironment {
        &self.env
    }

    // ═══════════════════════════════════════════════════════════
    // Purchase
    // ═══════════════════════════════════════════════════════════

    /// Buy an entitlement.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the principal is not linked to the entity
    /// - `MethodUnavailable` if the QR collaborator is not configured
    /// - `Conflict` if the entity already has a live subscription
    /// - `TransactionCreateFailed` if step 2 failed (after compensation)
    /// - `Storage` if the store fails before any write
    #[tracing::instrument(
        skip(self, principal),
        fields(principal_id = %principal.id, entity = %request.entity, tier = %request.tier, method = %request.method)
    )]
    pub async fn purchase(&self, principal: &Principal, request: PurchaseRequest) -> Result<Purchase> {
        let PurchaseRequest {
            entity,
            tier,
            method,
        } = request;

        if !self
            .env
            .verifier
            .authorize(principal, entity, Action::Purchase)
            .await
        {
            return Err(EntitlementError::Forbidden);
        }

        if method == PaymentMethod::InstantQr && !self.env.qr.is_configured() {
            return Err(EntitlementError::MethodUnavailable);
        }

        let now = self.env.clock.now();
        if let Some(existing) = self.env.store.has_active_or_pending(entity).await? {
            if existing.effective_status(now) == SubscriptionStatus::Expired {
                self.retire_lapsed(&existing, now).await?;
            } else {
                tracing::info!(existing_id = %existing.id, status = %existing.status, "Entity already has a live subscription");
                return Err(EntitlementError::Conflict);
            }
        }

        let quote = self.env.catalog.quote(entity.kind, tier);

        // Step 1. A concurrent purchase that passed the check above loses here.
        let subscription = self
            .env
            .store
            .create(NewSubscription {
                entity,
                tier,
                price: quote.price,
                currency: quote.currency.clone(),
                starts_at: now,
                expires_at: now + quote.duration(),
            })
            .await?;

        let payload = match method {
            PaymentMethod::ManualCash => MethodPayload::ManualCash,
            PaymentMethod::InstantQr => {
                let issued = self
                    .env
                    .qr
                    .issue(QrRequest {
                        subscription_id: subscription.id,
                        amount: quote.price,
                        currency: quote.currency.clone(),
                    })
                    .await;
                match issued {
                    Ok(code) => MethodPayload::InstantQr {
                        qr_payload: code.qr_payload,
                        settlement_reference: code.settlement_reference,
                    },
                    Err(QrError::NotConfigured) => {
                        self.compensate(&subscription).await;
                        return Err(EntitlementError::MethodUnavailable);
                    }
                    Err(QrError::Failed(reason)) => {
                        tracing::warn!(subscription_id = %subscription.id, %reason, "QR issue failed");
                        self.compensate(&subscription).await;
                        return Err(EntitlementError::TransactionCreateFailed(reason));
                    }
                }
            }
        };

        // Step 2.
        let transaction = match self
            .env
            .ledger
            .create(NewTransaction {
                subscription_id: subscription.id,
                amount: quote.price,
                currency: quote.currency,
                payload,
                created_at: now,
            })
            .await
        {
            Ok(transaction) => transaction,
            Err(e) => {
                tracing::warn!(subscription_id = %subscription.id, error = %e, "Transaction creation failed");
                self.compensate(&subscription).await;
                return Err(EntitlementError::TransactionCreateFailed(e.to_string()));
            }
        };

        let mut subscription = subscription;
        match self
            .env
            .store
            .link_transaction(subscription.id, transaction.id)
            .await
        {
            Ok(()) => subscription.transaction_id = Some(transaction.id),
            Err(e) => {
                // Both rows exist and the ledger row points at the subscription.
                tracing::error!(
                    inconsistency = "unlinked_transaction",
                    subscription_id = %subscription.id,
                    transaction_id = %transaction.id,
                    error = %e,
                    "Failed to link transaction to subscription"
                );
                metrics::record_inconsistency("unlinked_transaction");
            }
        }

        self.notify(Notification::Purchased {
            subscription_id: subscription.id,
            transaction_id: transaction.id,
            entity,
            method,
        })
        .await;

        metrics::record_purchase(entity.kind, method);
        tracing::info!(
            subscription_id = %subscription.id,
            transaction_id = %transaction.id,
            entity_kind = %entity.kind,
            entity_id = %entity.id,
            price = subscription.price_paid,
            "Subscription purchased"
        );

        Ok(Purchase {
            subscription,
            transaction,
        })
    }

    /// Store a lapsed `active` row as `expired` so a renewal can take its place.
    ///
    /// Losing the compare-and-swap means another request already moved the
    /// row out of `active`; the unique index still guards the insert.
    async fn retire_lapsed(&self, lapsed: &Subscription, now: DateTime<Utc>) -> Result<()> {
        match self
            .env
            .store
            .transition_to(
                lapsed.id,
                SubscriptionStatus::Expired,
                SubscriptionStatus::Active,
                now,
            )
            .await
        {
            Ok(_) => {
                tracing::info!(subscription_id = %lapsed.id, expires_at = %lapsed.expires_at, "Lapsed subscription expired on renewal");
                Ok(())
            }
            Err(EntitlementError::StaleState { actual, .. }) => {
                tracing::debug!(subscription_id = %lapsed.id, %actual, "Lapsed subscription already moved");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the subscription created in step 1. Attempted once.
    async fn compensate(&self, subscription: &Subscription) {
        match self.env.store.delete(subscription.id).await {
            Ok(()) => {
                metrics::record_rollback(true);
                tracing::info!(subscription_id = %subscription.id, "Rolled back subscription");
            }
            Err(e) => {
                metrics::record_rollback(false);
                metrics::record_inconsistency("orphan_subscription");
                tracing::error!(
                    inconsistency = "orphan_subscription",
                    subscription_id = %subscription.id,
                    entity_kind = %subscription.entity_kind,
                    entity_id = %subscription.entity_id,
                    error = %e,
                    "Rollback failed, subscription left in pending_payment"
                );
            }
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Paired resolution
    // ═══════════════════════════════════════════════════════════

    /// Administrator confirms a cash payment.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the principal is an administrator
    /// - `NotFound` if the transaction does not exist
    /// - `InvalidMethod` if the transaction is not `manual_cash`
    /// - `AlreadyResolved` if it is no longer pending
    #[tracing::instrument(skip(self, principal, admin_notes), fields(principal_id = %principal.id))]
    pub async fn confirm_manual(
        &self,
        principal: &Principal,
        transaction_id: TransactionId,
        admin_notes: Option<String>,
    ) -> Result<Settlement> {
        if !principal.is_admin() {
            return Err(EntitlementError::Forbidden);
        }
        self.settle(principal, transaction_id, Settle::ConfirmManual, admin_notes)
            .await
    }

    /// The external verifier reports an instant payment as received.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the principal is an administrator or service
    /// - `NotFound` if the transaction does not exist
    /// - `InvalidMethod` if the transaction is not `instant_qr`
    /// - `InvalidInput` if the reference does not match
    /// - `AlreadyResolved` if it is no longer pending
    #[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn confirm_instant(
        &self,
        principal: &Principal,
        transaction_id: TransactionId,
        settlement_reference: &str,
    ) -> Result<Settlement> {
        if !principal.can_settle() {
            return Err(EntitlementError::Forbidden);
        }
        self.settle(
            principal,
            transaction_id,
            Settle::ConfirmInstant {
                settlement_reference,
            },
            None,
        )
        .await
    }

    /// Administrator rejects a payment.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the principal is an administrator
    /// - `InvalidInput` if the reason is empty
    /// - `NotFound` if the transaction does not exist
    /// - `AlreadyResolved` if it is no longer pending
    #[tracing::instrument(skip(self, principal, reason), fields(principal_id = %principal.id))]
    pub async fn reject(
        &self,
        principal: &Principal,
        transaction_id: TransactionId,
        reason: &str,
    ) -> Result<Settlement> {
        if !principal.is_admin() {
            return Err(EntitlementError::Forbidden);
        }
        if reason.trim().is_empty() {
            return Err(EntitlementError::invalid_input("a rejection reason is required"));
        }
        self.settle(
            principal,
            transaction_id,
            Settle::Reject { reason },
            Some(reason.trim().to_string()),
        )
        .await
    }

    async fn settle(
        &self,
        principal: &Principal,
        transaction_id: TransactionId,
        command: Settle<'_>,
        admin_notes: Option<String>,
    ) -> Result<Settlement> {
        let transaction = self
            .env
            .ledger
            .get(transaction_id)
            .await?
            .ok_or_else(|| EntitlementError::not_found("transaction", transaction_id))?;

        let plan = lifecycle::plan_settlement(command, &transaction)?;
        let now = self.env.clock.now();

        let transaction = self
            .env
            .ledger
            .resolve(
                transaction_id,
                Resolution {
                    outcome: plan.outcome,
                    admin_notes: admin_notes.clone(),
                    verified_by: principal.id,
                    resolved_at: now,
                },
            )
            .await?;

        let subscription_id = transaction.subscription_id;
        let subscription = match self
            .env
            .store
            .transition_to(subscription_id, plan.target, plan.expected, now)
            .await
        {
            Ok(subscription) => subscription,
            Err(e @ (EntitlementError::StaleState { .. } | EntitlementError::NotFound { .. })) => {
                metrics::record_inconsistency("resolution_diverged");
                tracing::error!(
                    inconsistency = "resolution_diverged",
                    command = command.name(),
                    %subscription_id,
                    %transaction_id,
                    payment_status = %transaction.payment_status,
                    error = %e,
                    "Transaction resolved but subscription did not follow"
                );
                let current = self.env.store.get(subscription_id).await?;
                return Ok(Settlement {
                    subscription: current,
                    transaction,
                    consistent: false,
                });
            }
            Err(e) => {
                metrics::record_inconsistency("resolution_diverged");
                tracing::error!(
                    inconsistency = "resolution_diverged",
                    command = command.name(),
                    %subscription_id,
                    %transaction_id,
                    error = %e,
                    "Subscription transition failed after resolving transaction"
                );
                return Err(e);
            }
        };

        let entity = subscription.entity();
        match command {
            Settle::ConfirmManual | Settle::ConfirmInstant { .. } => {
                metrics::record_confirmation(transaction.method);
                tracing::info!(
                    %subscription_id,
                    %transaction_id,
                    entity_kind = %entity.kind,
                    entity_id = %entity.id,
                    expires_at = %subscription.expires_at,
                    "Payment confirmed, subscription active"
                );
                self.notify(Notification::Confirmed {
                    subscription_id,
                    transaction_id,
                    entity,
                })
                .await;
            }
            Settle::Reject { reason } => {
                metrics::record_rejection();
                tracing::info!(
                    %subscription_id,
                    %transaction_id,
                    entity_kind = %entity.kind,
                    entity_id = %entity.id,
                    "Payment rejected, subscription failed"
                );
                self.notify(Notification::Rejected {
                    subscription_id,
                    transaction_id,
                    entity,
                    reason: reason.trim().to_string(),
                })
                .await;
            }
        }

        Ok(Settlement {
            subscription: Some(subscription),
            transaction,
            consistent: true,
        })
    }

    // ═══════════════════════════════════════════════════════════
    // Cancellation
    // ═══════════════════════════════════════════════════════════

    /// Owner or administrator cancels an active subscription.
    ///
    /// When `entity_kind` is given it must match the subscription.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the subscription does not exist (or is of another kind)
    /// - `Forbidden` unless the principal is an administrator or linked owner
    /// - `NotActive` unless the subscription is active
    #[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn cancel(
        &self,
        principal: &Principal,
        subscription_id: SubscriptionId,
        entity_kind: Option<EntityKind>,
    ) -> Result<Subscription> {
        let subscription = self
            .env
            .store
            .get(subscription_id)
            .await?
            .filter(|s| entity_kind.is_none_or(|kind| kind == s.entity_kind))
            .ok_or_else(|| EntitlementError::not_found("subscription", subscription_id))?;

        let entity = subscription.entity();
        if !principal.is_admin()
            && !self
                .env
                .verifier
                .authorize(principal, entity, Action::Cancel)
                .await
        {
            return Err(EntitlementError::Forbidden);
        }

        let now = self.env.clock.now();
        lifecycle::plan_cancel(&subscription, now)?;
        let cancelled = self.env.store.cancel(subscription_id, now).await?;

        metrics::record_cancellation();
        tracing::info!(
            %subscription_id,
            entity_kind = %entity.kind,
            entity_id = %entity.id,
            "Subscription cancelled"
        );
        self.notify(Notification::Cancelled {
            subscription_id,
            entity,
        })
        .await;

        Ok(cancelled)
    }

    // ═══════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════

    /// Every subscription for every entity linked to the principal.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if a lookup fails.
    pub async fn subscriptions_for(&self, principal: &Principal) -> Result<Vec<SubscriptionView>> {
        let entities = self.env.verifier.owned_entities(principal).await?;
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.env.clock.now();
        let subscriptions = self.env.store.list_for_entities(&entities).await?;
        Ok(subscriptions
            .into_iter()
            .map(|s| SubscriptionView::at(s, now))
            .collect())
    }

    /// One subscription with its transaction.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the subscription does not exist
    /// - `Forbidden` unless the principal is an administrator or linked owner
    pub async fn subscription_detail(
        &self,
        principal: &Principal,
        subscription_id: SubscriptionId,
    ) -> Result<SubscriptionDetail> {
        let subscription = self
            .env
            .store
            .get(subscription_id)
            .await?
            .ok_or_else(|| EntitlementError::not_found("subscription", subscription_id))?;

        if !principal.is_admin()
            && !self
                .env
                .verifier
                .authorize(principal, subscription.entity(), Action::View)
                .await
        {
            return Err(EntitlementError::Forbidden);
        }

        let transaction = self.env.ledger.find_by_subscription(subscription_id).await?;
        Ok(SubscriptionDetail {
            subscription: SubscriptionView::at(subscription, self.env.clock.now()),
            transaction,
        })
    }

    /// Whether an entity currently has the VIP boost.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lookup fails.
    pub async fn vip_status(&self, entity: EntityRef) -> Result<VipStatus> {
        let now = self.env.clock.now();
        let live = self.env.store.has_active_or_pending(entity).await?;
        let active = live.filter(|s| s.is_vip(now));

        Ok(VipStatus {
            entity_kind: entity.kind,
            entity_id: entity.id,
            vip: active.is_some(),
            expires_at: active.map(|s| s.expires_at),
        })
    }

    /// Administrator transaction report.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the principal is an administrator
    /// - `Storage` if the lookup fails
    pub async fn list_transactions(
        &self,
        principal: &Principal,
        filter: TransactionFilter,
    ) -> Result<Vec<TransactionListing>> {
        if !principal.is_admin() {
            return Err(EntitlementError::Forbidden);
        }
        self.env.ledger.list_for_admin(filter.clamped()).await
    }

    /// Move every lapsed active subscription to `expired`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the principal is an administrator
    /// - `Storage` if the update fails
    #[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn sweep_expired(&self, principal: &Principal) -> Result<u64> {
        if !principal.is_admin() {
            return Err(EntitlementError::Forbidden);
        }
        let swept = self.env.store.sweep_expired(self.env.clock.now()).await?;
        metrics::record_expired_swept(swept);
        tracing::info!(swept, "Expired subscriptions swept");
        Ok(swept)
    }

    /// Catalog quotes for one entity kind.
    #[must_use]
    pub fn quotes(&self, entity_kind: EntityKind) -> Vec<Quote> {
        self.env.catalog.quotes_for(entity_kind)
    }

    /// Methods currently offered.
    #[must_use]
    pub fn available_methods(&self) -> Vec<PaymentMethod> {
        let mut methods = vec![PaymentMethod::ManualCash];
        if self.env.qr.is_configured() {
            methods.push(PaymentMethod::InstantQr);
        }
        methods
    }

    /// Readiness probe.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store is unreachable.
    pub async fn ping(&self) -> Result<()> {
        self.env.store.ping().await
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.env.notifier.notify(&notification).await {
            tracing::warn!(kind = notification.kind(), error = %e, "Notification failed, dropping");
        }
    }
}
