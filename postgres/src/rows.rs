//! Row mapping shared by the stores.

use entitlements_core::types::{PaymentTransaction, TransactionListing};
use entitlements_core::{
    EntitlementError, EntityId, PrincipalId, Result, Subscription, SubscriptionId,
    TransactionId,
};
use sqlx::Row;
use sqlx::postgres::PgRow;
use std::str::FromStr;
use uuid::Uuid;

/// Columns read by [`subscription_from_row`].
pub const SUBSCRIPTION_COLUMNS: &str = "id, entity_kind, entity_id, tier, status, starts_at, \
     expires_at, price_paid, currency, transaction_id, updated_at";

/// Columns read by [`transaction_from_row`].
pub const TRANSACTION_COLUMNS: &str = "id, subscription_id, amount, currency, method, \
     payment_status, qr_payload, settlement_reference, admin_notes, verified_by, created_at, \
     resolved_at";

pub fn db_error(context: &str, e: &sqlx::Error) -> EntitlementError {
    EntitlementError::Storage(format!("{context}: {e}"))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| db_error(&format!("Failed to read column {name}"), &e))
}

fn parsed<T>(row: &PgRow, name: &str) -> Result<T>
where
    T: FromStr<Err = EntitlementError>,
{
    let raw: String = column(row, name)?;
    raw.parse()
        .map_err(|e| EntitlementError::Storage(format!("Corrupt {name} column: {e}")))
}

pub fn subscription_from_row(row: &PgRow) -> Result<Subscription> {
    Ok(Subscription {
        id: SubscriptionId::from_uuid(column(row, "id")?),
        entity_kind: parsed(row, "entity_kind")?,
        entity_id: EntityId::from_uuid(column(row, "entity_id")?),
        tier: parsed(row, "tier")?,
        status: parsed(row, "status")?,
        starts_at: column(row, "starts_at")?,
        expires_at: column(row, "expires_at")?,
        price_paid: column(row, "price_paid")?,
        currency: column(row, "currency")?,
        transaction_id: column::<Option<Uuid>>(row, "transaction_id")?
            .map(TransactionId::from_uuid),
        updated_at: column(row, "updated_at")?,
    })
}

pub fn transaction_from_row(row: &PgRow) -> Result<PaymentTransaction> {
    Ok(PaymentTransaction {
        id: TransactionId::from_uuid(column(row, "id")?),
        subscription_id: SubscriptionId::from_uuid(column(row, "subscription_id")?),
        amount: column(row, "amount")?,
        currency: column(row, "currency")?,
        method: parsed(row, "method")?,
        payment_status: parsed(row, "payment_status")?,
        qr_payload: column(row, "qr_payload")?,
        settlement_reference: column(row, "settlement_reference")?,
        admin_notes: column(row, "admin_notes")?,
        verified_by: column::<Option<Uuid>>(row, "verified_by")?.map(PrincipalId::from_uuid),
        created_at: column(row, "created_at")?,
        resolved_at: column(row, "resolved_at")?,
    })
}

pub fn listing_from_row(row: &PgRow) -> Result<TransactionListing> {
    Ok(TransactionListing {
        transaction: transaction_from_row(row)?,
        tier: parsed(row, "tier")?,
        entity_kind: parsed(row, "entity_kind")?,
        entity_id: EntityId::from_uuid(column(row, "entity_id")?),
        subscription_status: parsed(row, "subscription_status")?,
    })
}
