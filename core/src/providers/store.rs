//! Entitlement store trait.

use crate::error::Result;
use crate::types::{
    EntityRef, NewSubscription, Subscription, SubscriptionId, SubscriptionStatus, TransactionId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Subscription persistence with invariant enforcement.
///
/// # Implementation Notes
///
/// - At most one `pending_payment`/`active` row per entity. The check in
///   [`EntitlementStore::has_active_or_pending`] is advisory; `create` must
///   enforce the rule atomically (unique partial index or equivalent) and
///   report the loser of a race as `Conflict`.
/// - Every status change is a compare-and-swap on the prior status.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Find the live (`pending_payment` or `active`) subscription for an entity.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails.
    async fn has_active_or_pending(&self, entity: EntityRef) -> Result<Option<Subscription>>;

    /// Insert a subscription in `pending_payment`.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the entity already has a live subscription
    /// - `Storage` if the backing store fails
    async fn create(&self, new: NewSubscription) -> Result<Subscription>;

    /// Fetch one subscription.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails.
    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>>;

    /// All subscriptions for the given entities, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails.
    async fn list_for_entities(&self, entities: &[EntityRef]) -> Result<Vec<Subscription>>;

    /// Second-phase link to the settling transaction.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the subscription is gone
    /// - `Storage` if the backing store fails
    async fn link_transaction(
        &self,
        id: SubscriptionId,
        transaction_id: TransactionId,
    ) -> Result<()>;

    /// Conditional status change.
    ///
    /// # Errors
    ///
    /// - `StaleState` if the stored status is not `expected`
    /// - `NotFound` if the subscription does not exist
    /// - `Storage` if the backing store fails
    async fn transition_to(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
        expected: SubscriptionStatus,
        at: DateTime<Utc>,
    ) -> Result<Subscription>;

    /// Move an `active` subscription to `cancelled`.
    ///
    /// # Errors
    ///
    /// - `NotActive` if the subscription is not `active`
    /// - `NotFound` if the subscription does not exist
    /// - `Storage` if the backing store fails
    async fn cancel(&self, id: SubscriptionId, at: DateTime<Utc>) -> Result<Subscription>;

    /// Remove a subscription. Only used as the purchase saga's compensation.
    ///
    /// Deleting an absent row succeeds.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails.
    async fn delete(&self, id: SubscriptionId) -> Result<()>;

    /// Move every `active` row whose `expires_at` is before `now` to `expired`.
    ///
    /// Returns the number of rows moved.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Check the backing store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if it is not.
    async fn ping(&self) -> Result<()>;
}
