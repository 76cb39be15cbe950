//! PostgreSQL payment transaction ledger.

use crate::rows::{TRANSACTION_COLUMNS, db_error, listing_from_row, transaction_from_row};
use async_trait::async_trait;
use entitlements_core::providers::TransactionLedger;
use entitlements_core::types::{
    MethodPayload, NewTransaction, PaymentTransaction, Resolution, TransactionListing,
};
use entitlements_core::{
    EntitlementError, PaymentStatus, Result, SubscriptionId, TransactionFilter, TransactionId,
};
use sqlx::PgPool;

/// PostgreSQL transaction ledger.
///
/// Resolution is a conditional `UPDATE` on `payment_status = 'pending'`:
/// of two racing verifies (or a verify and a reject) exactly one returns
/// the row and the other sees `AlreadyResolved`.
#[derive(Clone)]
pub struct PostgresTransactionLedger {
    pool: PgPool,
}

impl PostgresTransactionLedger {
    /// Create a new ledger.
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionLedger for PostgresTransactionLedger {
    async fn create(&self, new: NewTransaction) -> Result<PaymentTransaction> {
        let method = new.payload.method();
        let (qr_payload, settlement_reference) = match new.payload {
            MethodPayload::ManualCash => (None, None),
            MethodPayload::InstantQr {
                qr_payload,
                settlement_reference,
            } => (Some(qr_payload), Some(settlement_reference)),
        };

        let row = sqlx::query(&format!(
            "INSERT INTO payment_transactions \
                 (id, subscription_id, amount, currency, method, payment_status, \
                  qr_payload, settlement_reference, created_at) \
             VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, $8) \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(TransactionId::new().as_uuid())
        .bind(new.subscription_id.as_uuid())
        .bind(new.amount)
        .bind(&new.currency)
        .bind(method.as_str())
        .bind(qr_payload)
        .bind(settlement_reference)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create transaction", &e))?;

        transaction_from_row(&row)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<PaymentTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM payment_transactions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get transaction", &e))?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn find_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<Option<PaymentTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM payment_transactions WHERE subscription_id = $1"
        ))
        .bind(subscription_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get transaction", &e))?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn resolve(
        &self,
        id: TransactionId,
        resolution: Resolution,
    ) -> Result<PaymentTransaction> {
        let row = sqlx::query(&format!(
            "UPDATE payment_transactions \
             SET payment_status = $2, admin_notes = $3, verified_by = $4, resolved_at = $5 \
             WHERE id = $1 AND payment_status = 'pending' \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(resolution.outcome.payment_status().as_str())
        .bind(&resolution.admin_notes)
        .bind(resolution.verified_by.as_uuid())
        .bind(resolution.resolved_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to resolve transaction", &e))?;

        if let Some(row) = row {
            return transaction_from_row(&row);
        }

        match self.get(id).await? {
            Some(existing) if existing.payment_status != PaymentStatus::Pending => {
                Err(EntitlementError::AlreadyResolved)
            }
            Some(_) => Err(EntitlementError::Storage(format!(
                "transaction {id} stayed pending after conditional resolve"
            ))),
            None => Err(EntitlementError::not_found("transaction", id)),
        }
    }

    async fn list_for_admin(&self, filter: TransactionFilter) -> Result<Vec<TransactionListing>> {
        let rows = sqlx::query(
            "SELECT t.id, t.subscription_id, t.amount, t.currency, t.method, t.payment_status, \
                    t.qr_payload, t.settlement_reference, t.admin_notes, t.verified_by, \
                    t.created_at, t.resolved_at, \
                    s.tier, s.entity_kind, s.entity_id, s.status AS subscription_status \
             FROM payment_transactions t \
             JOIN subscriptions s ON s.id = t.subscription_id \
             WHERE ($1::text IS NULL OR t.method = $1) \
               AND ($2::text IS NULL OR t.payment_status = $2) \
             ORDER BY t.created_at DESC, t.id \
             LIMIT $3 OFFSET $4",
        )
        .bind(filter.method.map(|m| m.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(i64::from(filter.limit))
        .bind(i64::from(filter.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list transactions", &e))?;

        rows.iter().map(listing_from_row).collect()
    }
}
