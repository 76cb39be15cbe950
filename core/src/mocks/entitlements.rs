//! In-memory subscription store and transaction ledger.
//!
//! Both providers share one lock so the one-live-row check-and-insert and every
//! compare-and-swap is atomic, mirroring what the database gives the
//! PostgreSQL implementations.

use crate::error::{EntitlementError, Result};
use crate::providers::{EntitlementStore, TransactionLedger};
use crate::types::{
    EntityRef, MethodPayload, NewSubscription, NewTransaction, PaymentStatus, PaymentTransaction,
    Resolution, Subscription, SubscriptionId, SubscriptionStatus, TransactionFilter,
    TransactionId, TransactionListing,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    /// Insertion order
    subscriptions: Vec<Subscription>,
    /// Insertion order
    transactions: Vec<PaymentTransaction>,
    fail_next_transaction_create: bool,
    fail_next_delete: bool,
    fail_next_link: bool,
}

impl State {
    fn subscription_mut(&mut self, id: SubscriptionId) -> Result<&mut Subscription> {
        self.subscriptions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| EntitlementError::not_found("subscription", id))
    }
}

/// In-memory store and ledger with failure injection.
///
/// # Example
///
/// ```
/// use entitlements_core::mocks::InMemoryEntitlements;
///
/// let entitlements = InMemoryEntitlements::new();
/// entitlements.fail_next_transaction_create();
/// assert_eq!(entitlements.subscription_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntitlements {
    state: Arc<Mutex<State>>,
}

impl InMemoryEntitlements {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| EntitlementError::Storage("Mutex lock failed".to_string()))
    }

    /// Make the next ledger `create` fail.
    pub fn fail_next_transaction_create(&self) {
        if let Ok(mut state) = self.lock() {
            state.fail_next_transaction_create = true;
        }
    }

    /// Make the next store `delete` fail.
    pub fn fail_next_delete(&self) {
        if let Ok(mut state) = self.lock() {
            state.fail_next_delete = true;
        }
    }

    /// Make the next `link_transaction` fail.
    pub fn fail_next_link(&self) {
        if let Ok(mut state) = self.lock() {
            state.fail_next_link = true;
        }
    }

    /// Number of stored subscriptions, any status.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.lock().map(|s| s.subscriptions.len()).unwrap_or(0)
    }

    /// All stored subscriptions in insertion order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.lock()
            .map(|s| s.subscriptions.clone())
            .unwrap_or_default()
    }

    /// All stored transactions in insertion order.
    #[must_use]
    pub fn transactions(&self) -> Vec<PaymentTransaction> {
        self.lock()
            .map(|s| s.transactions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlements {
    async fn has_active_or_pending(&self, entity: EntityRef) -> Result<Option<Subscription>> {
        let state = self.lock()?;
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.entity() == entity && s.status.is_live())
            .cloned())
    }

    async fn create(&self, new: NewSubscription) -> Result<Subscription> {
        let mut state = self.lock()?;

        // Same rule as the partial unique index.
        if state
            .subscriptions
            .iter()
            .any(|s| s.entity() == new.entity && s.status.is_live())
        {
            return Err(EntitlementError::Conflict);
        }

        let subscription = Subscription {
            id: SubscriptionId::new(),
            entity_kind: new.entity.kind,
            entity_id: new.entity.id,
            tier: new.tier,
            status: SubscriptionStatus::PendingPayment,
            starts_at: new.starts_at,
            expires_at: new.expires_at,
            price_paid: new.price,
            currency: new.currency,
            transaction_id: None,
            updated_at: new.starts_at,
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        let state = self.lock()?;
        Ok(state.subscriptions.iter().find(|s| s.id == id).cloned())
    }

    async fn list_for_entities(&self, entities: &[EntityRef]) -> Result<Vec<Subscription>> {
        let state = self.lock()?;
        let mut found: Vec<Subscription> = state
            .subscriptions
            .iter()
            .rev()
            .filter(|s| entities.contains(&s.entity()))
            .cloned()
            .collect();
        // Stable, so equal start times keep newest-inserted first.
        found.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
        Ok(found)
    }

    async fn link_transaction(
        &self,
        id: SubscriptionId,
        transaction_id: TransactionId,
    ) -> Result<()> {
        let mut state = self.lock()?;
        if std::mem::take(&mut state.fail_next_link) {
            return Err(EntitlementError::Storage("injected link failure".to_string()));
        }
        state.subscription_mut(id)?.transaction_id = Some(transaction_id);
        Ok(())
    }

    async fn transition_to(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
        expected: SubscriptionStatus,
        at: DateTime<Utc>,
    ) -> Result<Subscription> {
        let mut state = self.lock()?;
        let subscription = state.subscription_mut(id)?;
        if subscription.status != expected {
            return Err(EntitlementError::StaleState {
                expected,
                actual: subscription.status,
            });
        }
        subscription.status = status;
        subscription.updated_at = at;
        Ok(subscription.clone())
    }

    async fn cancel(&self, id: SubscriptionId, at: DateTime<Utc>) -> Result<Subscription> {
        let mut state = self.lock()?;
        let subscription = state.subscription_mut(id)?;
        if subscription.status != SubscriptionStatus::Active {
            return Err(EntitlementError::NotActive);
        }
        subscription.status = SubscriptionStatus::Cancelled;
        subscription.updated_at = at;
        Ok(subscription.clone())
    }

    async fn delete(&self, id: SubscriptionId) -> Result<()> {
        let mut state = self.lock()?;
        if std::mem::take(&mut state.fail_next_delete) {
            return Err(EntitlementError::Storage("injected delete failure".to_string()));
        }
        state.subscriptions.retain(|s| s.id != id);
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.lock()?;
        let mut swept = 0;
        for subscription in &mut state.subscriptions {
            if subscription.status == SubscriptionStatus::Active && subscription.expires_at < now {
                subscription.status = SubscriptionStatus::Expired;
                subscription.updated_at = now;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

#[async_trait]
impl TransactionLedger for InMemoryEntitlements {
    async fn create(&self, new: NewTransaction) -> Result<PaymentTransaction> {
        let mut state = self.lock()?;
        if std::mem::take(&mut state.fail_next_transaction_create) {
            return Err(EntitlementError::Storage(
                "injected transaction create failure".to_string(),
            ));
        }
        if state
            .transactions
            .iter()
            .any(|t| t.subscription_id == new.subscription_id)
        {
            return Err(EntitlementError::Storage(format!(
                "subscription {} already has a transaction",
                new.subscription_id
            )));
        }

        let method = new.payload.method();
        let (qr_payload, settlement_reference) = match new.payload {
            MethodPayload::ManualCash => (None, None),
            MethodPayload::InstantQr {
                qr_payload,
                settlement_reference,
            } => (Some(qr_payload), Some(settlement_reference)),
        };

        let transaction = PaymentTransaction {
            id: TransactionId::new(),
            subscription_id: new.subscription_id,
            amount: new.amount,
            currency: new.currency,
            method,
            payment_status: PaymentStatus::Pending,
            qr_payload,
            settlement_reference,
            admin_notes: None,
            verified_by: None,
            created_at: new.created_at,
            resolved_at: None,
        };
        state.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<PaymentTransaction>> {
        let state = self.lock()?;
        Ok(state.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<Option<PaymentTransaction>> {
        let state = self.lock()?;
        Ok(state
            .transactions
            .iter()
            .find(|t| t.subscription_id == subscription_id)
            .cloned())
    }

    async fn resolve(
        &self,
        id: TransactionId,
        resolution: Resolution,
    ) -> Result<PaymentTransaction> {
        let mut state = self.lock()?;
        let transaction = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| EntitlementError::not_found("transaction", id))?;

        if transaction.payment_status != PaymentStatus::Pending {
            return Err(EntitlementError::AlreadyResolved);
        }
        transaction.payment_status = resolution.outcome.payment_status();
        transaction.admin_notes = resolution.admin_notes;
        transaction.verified_by = Some(resolution.verified_by);
        transaction.resolved_at = Some(resolution.resolved_at);
        Ok(transaction.clone())
    }

    async fn list_for_admin(&self, filter: TransactionFilter) -> Result<Vec<TransactionListing>> {
        let state = self.lock()?;
        let offset = usize::try_from(filter.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit).unwrap_or(usize::MAX);

        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| filter.method.is_none_or(|m| m == t.method))
            .filter(|t| filter.status.is_none_or(|s| s == t.payment_status))
            .filter_map(|t| {
                let subscription = state
                    .subscriptions
                    .iter()
                    .find(|s| s.id == t.subscription_id)?;
                Some(TransactionListing {
                    transaction: t.clone(),
                    tier: subscription.tier,
                    entity_kind: subscription.entity_kind,
                    entity_id: subscription.entity_id,
                    subscription_status: subscription.status,
                })
            })
            .skip(offset)
            .take(limit)
            .collect())
    }
}
