//! PostgreSQL subscription store.

use crate::rows::{SUBSCRIPTION_COLUMNS, db_error, subscription_from_row};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entitlements_core::providers::EntitlementStore;
use entitlements_core::types::NewSubscription;
use entitlements_core::{
    EntitlementError, EntityRef, Result, Subscription, SubscriptionId, SubscriptionStatus,
    TransactionId,
};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL subscription store.
///
/// Status changes are single conditional `UPDATE`s, so concurrent confirm,
/// reject, cancel and sweep calls resolve by whichever commits first.
#[derive(Clone)]
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    /// Create a new store.
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stored status of one subscription, used to explain a failed
    /// conditional update.
    async fn current_status(&self, id: SubscriptionId) -> Result<Option<SubscriptionStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM subscriptions WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to read subscription status", &e))?;

        status
            .map(|s| {
                s.parse()
                    .map_err(|e| EntitlementError::Storage(format!("Corrupt status column: {e}")))
            })
            .transpose()
    }
}

#[async_trait]
impl EntitlementStore for PostgresSubscriptionStore {
    async fn has_active_or_pending(&self, entity: EntityRef) -> Result<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE entity_kind = $1 AND entity_id = $2 \
               AND status IN ('pending_payment', 'active') \
             LIMIT 1"
        ))
        .bind(entity.kind.as_str())
        .bind(entity.id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to check live subscription", &e))?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn create(&self, new: NewSubscription) -> Result<Subscription> {
        let row = sqlx::query(&format!(
            "INSERT INTO subscriptions \
                 (id, entity_kind, entity_id, tier, status, starts_at, expires_at, \
                  price_paid, currency, updated_at) \
             VALUES ($1, $2, $3, $4, 'pending_payment', $5, $6, $7, $8, $5) \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(SubscriptionId::new().as_uuid())
        .bind(new.entity.kind.as_str())
        .bind(new.entity.id.as_uuid())
        .bind(new.tier.as_str())
        .bind(new.starts_at)
        .bind(new.expires_at)
        .bind(new.price)
        .bind(&new.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // The partial unique index rejects a second live row for the entity.
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    tracing::info!(entity = %new.entity, "Concurrent purchase lost on unique index");
                    return EntitlementError::Conflict;
                }
            }
            db_error("Failed to create subscription", &e)
        })?;

        subscription_from_row(&row)
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get subscription", &e))?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn list_for_entities(&self, entities: &[EntityRef]) -> Result<Vec<Subscription>> {
        let kinds: Vec<String> = entities.iter().map(|e| e.kind.as_str().to_string()).collect();
        let ids: Vec<Uuid> = entities.iter().map(|e| *e.id.as_uuid()).collect();

        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE (entity_kind, entity_id) IN ( \
                 SELECT * FROM UNNEST($1::text[], $2::uuid[]) \
             ) \
             ORDER BY starts_at DESC, created_at DESC"
        ))
        .bind(&kinds)
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list subscriptions", &e))?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn link_transaction(
        &self,
        id: SubscriptionId,
        transaction_id: TransactionId,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE subscriptions SET transaction_id = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(transaction_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to link transaction", &e))?;

        if result.rows_affected() == 0 {
            return Err(EntitlementError::not_found("subscription", id));
        }
        Ok(())
    }

    async fn transition_to(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
        expected: SubscriptionStatus,
        at: DateTime<Utc>,
    ) -> Result<Subscription> {
        let row = sqlx::query(&format!(
            "UPDATE subscriptions SET status = $2, updated_at = $4 \
             WHERE id = $1 AND status = $3 \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(expected.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to transition subscription", &e))?;

        match row {
            Some(row) => subscription_from_row(&row),
            None => match self.current_status(id).await? {
                Some(actual) => Err(EntitlementError::StaleState { expected, actual }),
                None => Err(EntitlementError::not_found("subscription", id)),
            },
        }
    }

    async fn cancel(&self, id: SubscriptionId, at: DateTime<Utc>) -> Result<Subscription> {
        let row = sqlx::query(&format!(
            "UPDATE subscriptions SET status = 'cancelled', updated_at = $2 \
             WHERE id = $1 AND status = 'active' \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to cancel subscription", &e))?;

        match row {
            Some(row) => subscription_from_row(&row),
            None => match self.current_status(id).await? {
                Some(_) => Err(EntitlementError::NotActive),
                None => Err(EntitlementError::not_found("subscription", id)),
            },
        }
    }

    async fn delete(&self, id: SubscriptionId) -> Result<()> {
        sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete subscription", &e))?;
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = 'expired', updated_at = $1 \
             WHERE status = 'active' AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to sweep expired subscriptions", &e))?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Database unreachable", &e))?;
        Ok(())
    }
}
