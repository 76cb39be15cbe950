//! Subscription endpoints for entity owners.

use super::parse_uuid;
use crate::error::AppError;
use crate::extractors::{CorrelationId, CurrentPrincipal};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use entitlements_core::{
    EntityId, EntityKind, EntityRef, PaymentMethod, Purchase, PurchaseRequest, Subscription,
    SubscriptionDetail, SubscriptionId, SubscriptionView, Tier, VipStatus,
};
use serde::{Deserialize, Serialize};

/// Body of `POST /subscriptions`.
///
/// Fields arrive as strings so an unknown enum value is answered with
/// `INVALID_INPUT` rather than a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct PurchaseBody {
    /// `profile` or `venue`
    pub entity_kind: String,
    /// Entity UUID
    pub entity_id: String,
    /// `short`, `medium` or `long`
    pub tier: String,
    /// `manual_cash` or `instant_qr`
    pub payment_method: String,
}

impl PurchaseBody {
    fn into_request(self) -> Result<PurchaseRequest, AppError> {
        let kind: EntityKind = self.entity_kind.parse()?;
        let id = EntityId::from_uuid(parse_uuid("entity_id", &self.entity_id)?);
        let tier: Tier = self.tier.parse()?;
        let method: PaymentMethod = self.payment_method.parse()?;

        Ok(PurchaseRequest {
            entity: EntityRef { kind, id },
            tier,
            method,
        })
    }
}

/// `POST /subscriptions`
///
/// # Errors
///
/// 400 `INVALID_INPUT`/`METHOD_UNAVAILABLE`, 403, 409
/// `CONFLICT`, or 500 after a rolled-back partial write.
pub async fn purchase(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    correlation_id: CorrelationId,
    Json(body): Json<PurchaseBody>,
) -> Result<(StatusCode, Json<Purchase>), AppError> {
    let request = body.into_request()?;
    tracing::debug!(
        correlation_id = %correlation_id.0,
        entity = %request.entity,
        tier = %request.tier,
        method = %request.method,
        "Purchase requested"
    );

    let purchase = state.orchestrator.purchase(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

/// Response of `GET /subscriptions/mine`.
#[derive(Debug, Serialize)]
pub struct MySubscriptionsResponse {
    /// Subscriptions for every entity the caller owns or manages
    pub subscriptions: Vec<SubscriptionView>,
}

/// `GET /subscriptions/mine`
///
/// # Errors
///
/// 401 without a valid token.
pub async fn my_subscriptions(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<MySubscriptionsResponse>, AppError> {
    let subscriptions = state.orchestrator.subscriptions_for(&principal).await?;
    Ok(Json(MySubscriptionsResponse { subscriptions }))
}

/// `GET /subscriptions/{id}`
///
/// # Errors
///
/// 403 unless the caller owns the entity or is an administrator; 404.
pub async fn get_subscription(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> Result<Json<SubscriptionDetail>, AppError> {
    let id = SubscriptionId::from_uuid(parse_uuid("subscription id", &id)?);
    let detail = state.orchestrator.subscription_detail(&principal, id).await?;
    Ok(Json(detail))
}

/// Body of `POST /subscriptions/{id}/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelBody {
    /// Must match the subscription when given
    pub entity_kind: Option<String>,
}

/// `POST /subscriptions/{id}/cancel`
///
/// # Errors
///
/// 400 `NOT_ACTIVE`, 403, 404.
pub async fn cancel(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
    body: Option<Json<CancelBody>>,
) -> Result<Json<Subscription>, AppError> {
    let id = SubscriptionId::from_uuid(parse_uuid("subscription id", &id)?);
    let entity_kind = body
        .and_then(|Json(body)| body.entity_kind)
        .as_deref()
        .map(str::parse::<EntityKind>)
        .transpose()?;

    let cancelled = state.orchestrator.cancel(&principal, id, entity_kind).await?;
    Ok(Json(cancelled))
}

/// `GET /entities/{entity_kind}/{entity_id}/vip`
///
/// Public.
///
/// # Errors
///
/// 400 `INVALID_INPUT` for a bad kind or id.
pub async fn vip_status(
    State(state): State<AppState>,
    Path((entity_kind, entity_id)): Path<(String, String)>,
) -> Result<Json<VipStatus>, AppError> {
    let entity = EntityRef {
        kind: entity_kind.parse()?,
        id: EntityId::from_uuid(parse_uuid("entity_id", &entity_id)?),
    };
    Ok(Json(state.orchestrator.vip_status(entity).await?))
}
