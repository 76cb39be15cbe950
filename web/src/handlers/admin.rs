//! Back-office endpoints.
//!
//! Role checks live in the orchestrator: a member token reaches these
//! handlers and is answered 403 there.

use super::parse_uuid;
use crate::error::AppError;
use crate::extractors::CurrentPrincipal;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use entitlements_core::{
    PaymentMethod, PaymentStatus, Settlement, TransactionFilter, TransactionId,
    TransactionListing,
};
use serde::{Deserialize, Serialize};

/// Body of `POST /admin/transactions/{id}/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    /// Free-form note stored on the transaction
    pub admin_notes: Option<String>,
}

/// `POST /admin/transactions/{id}/verify`
///
/// # Errors
///
/// 400 `INVALID_METHOD`/`ALREADY_RESOLVED`, 403, 404.
pub async fn verify(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
    body: Option<Json<VerifyBody>>,
) -> Result<Json<Settlement>, AppError> {
    let id = TransactionId::from_uuid(parse_uuid("transaction id", &id)?);
    let notes = body
        .and_then(|Json(body)| body.admin_notes)
        .filter(|n| !n.trim().is_empty());

    let settlement = state.orchestrator.confirm_manual(&principal, id, notes).await?;
    Ok(Json(settlement))
}

/// Body of `POST /admin/transactions/{id}/reject`.
#[derive(Debug, Deserialize)]
pub struct RejectBody {
    /// Rejection reason, required
    pub admin_notes: Option<String>,
}

/// `POST /admin/transactions/{id}/reject`
///
/// # Errors
///
/// 400 for a missing reason or `ALREADY_RESOLVED`, 403, 404.
pub async fn reject(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
    body: Option<Json<RejectBody>>,
) -> Result<Json<Settlement>, AppError> {
    let id = TransactionId::from_uuid(parse_uuid("transaction id", &id)?);
    let reason = body
        .and_then(|Json(body)| body.admin_notes)
        .unwrap_or_default();

    let settlement = state.orchestrator.reject(&principal, id, &reason).await?;
    Ok(Json(settlement))
}

/// Body of `POST /admin/transactions/{id}/settle`.
#[derive(Debug, Deserialize)]
pub struct SettleBody {
    /// Reference issued with the QR code
    pub settlement_reference: String,
}

/// `POST /admin/transactions/{id}/settle`
///
/// Called by the external instant-payment verifier (service role) or an
/// administrator.
///
/// # Errors
///
/// 400 `INVALID_METHOD`/`INVALID_INPUT`/`ALREADY_RESOLVED`, 403, 404.
pub async fn settle(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
    Json(body): Json<SettleBody>,
) -> Result<Json<Settlement>, AppError> {
    let id = TransactionId::from_uuid(parse_uuid("transaction id", &id)?);
    let settlement = state
        .orchestrator
        .confirm_instant(&principal, id, &body.settlement_reference)
        .await?;
    Ok(Json(settlement))
}

/// Query string of `GET /admin/transactions`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// `manual_cash` or `instant_qr`
    pub method: Option<String>,
    /// `pending`, `completed` or `failed`
    pub status: Option<String>,
    /// Page size, default 50, at most 200
    pub limit: Option<u32>,
    /// Rows to skip
    pub offset: Option<u32>,
}

impl ListQuery {
    fn into_filter(self) -> Result<TransactionFilter, AppError> {
        let method = non_empty(self.method)
            .map(|m| m.parse::<PaymentMethod>())
            .transpose()?;
        let status = non_empty(self.status)
            .map(|s| s.parse::<PaymentStatus>())
            .transpose()?;

        Ok(TransactionFilter {
            method,
            status,
            limit: self.limit.unwrap_or(TransactionFilter::DEFAULT_LIMIT),
            offset: self.offset.unwrap_or(0),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// A page of the admin listing.
#[derive(Debug, Serialize)]
pub struct TransactionPage {
    /// Rows on this page
    pub transactions: Vec<TransactionListing>,
    /// Page size actually applied
    pub limit: u32,
    /// Rows skipped
    pub offset: u32,
}

/// `GET /admin/transactions?method=&status=&limit=&offset=`
///
/// # Errors
///
/// 400 `INVALID_INPUT` for an unknown method or status, 403.
pub async fn list_transactions(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<ListQuery>,
) -> Result<Json<TransactionPage>, AppError> {
    let filter = query.into_filter()?.clamped();
    let transactions = state
        .orchestrator
        .list_transactions(&principal, filter)
        .await?;

    Ok(Json(TransactionPage {
        transactions,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

/// Response of the expiry sweep.
#[derive(Debug, Serialize)]
pub struct SweepResponse {
    /// Subscriptions moved to `expired`
    pub swept: u64,
}

/// `POST /admin/subscriptions/sweep-expired`
///
/// # Errors
///
/// 403 for non-administrators.
pub async fn sweep_expired(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<SweepResponse>, AppError> {
    let swept = state.orchestrator.sweep_expired(&principal).await?;
    Ok(Json(SweepResponse { swept }))
}
