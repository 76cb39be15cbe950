//! HTTP request handlers, grouped by audience.

pub mod admin;
pub mod health;
pub mod pricing;
pub mod subscriptions;

use crate::error::AppError;
use entitlements_core::EntitlementError;
use uuid::Uuid;

/// Parse an id from a path or body field, answering `INVALID_INPUT`.
pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| EntitlementError::invalid_input(format!("{field} is not a valid id")).into())
}
