//! Payment transaction ledger trait.

use crate::error::Result;
use crate::types::{
    NewTransaction, PaymentTransaction, Resolution, SubscriptionId, TransactionFilter,
    TransactionId, TransactionListing,
};
use async_trait::async_trait;

/// Records settlement attempts and their single terminal outcome.
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Insert a transaction in `pending`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails (including when the
    /// subscription already owns a transaction).
    async fn create(&self, new: NewTransaction) -> Result<PaymentTransaction>;

    /// Fetch one transaction.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails.
    async fn get(&self, id: TransactionId) -> Result<Option<PaymentTransaction>>;

    /// The transaction owned by a subscription, if any.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails.
    async fn find_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<Option<PaymentTransaction>>;

    /// Conditional terminal transition from `pending`.
    ///
    /// # Errors
    ///
    /// - `AlreadyResolved` if the transaction is not `pending`
    /// - `NotFound` if it does not exist
    /// - `Storage` if the backing store fails
    async fn resolve(&self, id: TransactionId, resolution: Resolution)
    -> Result<PaymentTransaction>;

    /// Reporting view joined with the owning subscription, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing store fails.
    async fn list_for_admin(&self, filter: TransactionFilter) -> Result<Vec<TransactionListing>>;
}
