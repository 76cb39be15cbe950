//! `PostgreSQL` storage for the entitlement engine.
//!
//! Implements the storage providers from `entitlements-core`:
//!
//! - [`PostgresSubscriptionStore`]: `EntitlementStore`, with the one-live-row rule enforced by
//!   the `subscriptions_one_live_per_entity` partial unique index
//! - [`PostgresTransactionLedger`]: `TransactionLedger`, resolution as a
//!   conditional `UPDATE ... WHERE payment_status = 'pending'`
//! - [`PostgresOwnershipDirectory`]: `OwnershipDirectory` over the
//!   `profiles` and `venue_owners` tables
//!
//! Queries are checked at runtime, so building needs no `DATABASE_URL`.
//!
//! # Example
//!
//! ```ignore
//! use entitlements_postgres::{migrate, PostgresSubscriptionStore, PostgresTransactionLedger};
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/entitlements").await?;
//! migrate(&pool).await?;
//!
//! let store = PostgresSubscriptionStore::new(pool.clone());
//! let ledger = PostgresTransactionLedger::new(pool);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod rows;

pub mod ownership;
pub mod subscriptions;
pub mod transactions;

pub use ownership::PostgresOwnershipDirectory;
pub use subscriptions::PostgresSubscriptionStore;
pub use transactions::PostgresTransactionLedger;

use entitlements_core::{EntitlementError, Result};
use sqlx::PgPool;

/// Run the bundled migrations.
///
/// # Errors
///
/// Returns [`EntitlementError::Storage`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| EntitlementError::Storage(format!("Migration failed: {e}")))?;
    Ok(())
}
