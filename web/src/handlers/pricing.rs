//! Public catalog endpoints.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use entitlements_core::{EntityKind, PaymentMethod, Quote};
use serde::Serialize;

/// Catalog for one entity kind.
#[derive(Debug, Serialize)]
pub struct PricingResponse {
    /// Requested kind
    pub entity_kind: EntityKind,
    /// One quote per tier
    pub quotes: Vec<Quote>,
}

/// `GET /pricing/{entity_kind}`
///
/// # Errors
///
/// 400 `INVALID_INPUT` for an unknown entity kind.
pub async fn get_pricing(
    State(state): State<AppState>,
    Path(entity_kind): Path<String>,
) -> Result<Json<PricingResponse>, AppError> {
    let entity_kind: EntityKind = entity_kind.parse()?;

    Ok(Json(PricingResponse {
        entity_kind,
        quotes: state.orchestrator.quotes(entity_kind),
    }))
}

/// Methods currently offered.
#[derive(Debug, Serialize)]
pub struct PaymentMethodsResponse {
    /// `manual_cash`, plus `instant_qr` when configured
    pub methods: Vec<PaymentMethod>,
}

/// `GET /payment-methods`
pub async fn get_payment_methods(State(state): State<AppState>) -> Json<PaymentMethodsResponse> {
    Json(PaymentMethodsResponse {
        methods: state.orchestrator.available_methods(),
    })
}
