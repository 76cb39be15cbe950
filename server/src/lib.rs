//! Entitlements HTTP server.
//!
//! Wires the PostgreSQL providers, the HTTP QR collaborator and the static
//! token authenticator into the axum router.

pub mod config;
pub mod qr;

use config::Config;
use entitlements_core::providers::TracingNotificationSink;
use entitlements_core::{
    LifecycleEnvironment, LifecycleOrchestrator, OwnershipVerifier, PricingCatalog, SystemClock,
};
use entitlements_postgres::{
    PostgresOwnershipDirectory, PostgresSubscriptionStore, PostgresTransactionLedger,
};
use entitlements_web::{AppState, StaticTokenAuthenticator};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

/// Open the connection pool described by `config`.
///
/// # Errors
///
/// Returns an error if the database cannot be reached.
pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .min_connections(config.postgres.min_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await
}

/// Build the application state over `pool`.
///
/// # Errors
///
/// Returns an error if `AUTH_TOKENS` does not parse or the QR client cannot
/// be built.
pub fn build_state(config: &Config, pool: PgPool) -> anyhow::Result<AppState> {
    let authenticator = StaticTokenAuthenticator::from_spec(&config.auth.tokens)?;
    if authenticator.is_empty() {
        tracing::warn!("AUTH_TOKENS is empty; every authenticated route will answer 401");
    }

    let environment = LifecycleEnvironment {
        store: Arc::new(PostgresSubscriptionStore::new(pool.clone())),
        ledger: Arc::new(PostgresTransactionLedger::new(pool.clone())),
        verifier: OwnershipVerifier::standard(Arc::new(PostgresOwnershipDirectory::new(pool))),
        catalog: PricingCatalog::new(config.pricing.currency.clone()),
        qr: qr::from_config(&config.instant_qr)?,
        notifier: Arc::new(TracingNotificationSink),
        clock: Arc::new(SystemClock),
    };

    Ok(AppState::new(
        LifecycleOrchestrator::new(environment),
        Arc::new(authenticator),
    ))
}
