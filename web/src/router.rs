//! Route table.

use crate::handlers::{admin, health, pricing, subscriptions};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the full HTTP surface.
///
/// ```text
/// GET  /health
/// GET  /ready
/// GET  /pricing/:entity_kind
/// GET  /payment-methods
/// GET  /entities/:entity_kind/:entity_id/vip
/// POST /subscriptions
/// GET  /subscriptions/mine
/// GET  /subscriptions/:id
/// POST /subscriptions/:id/cancel
/// POST /admin/transactions/:id/verify
/// POST /admin/transactions/:id/reject
/// POST /admin/transactions/:id/settle
/// GET  /admin/transactions
/// POST /admin/subscriptions/sweep-expired
/// ```
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/pricing/:entity_kind", get(pricing::get_pricing))
        .route("/payment-methods", get(pricing::get_payment_methods))
        .route(
            "/entities/:entity_kind/:entity_id/vip",
            get(subscriptions::vip_status),
        );

    let owners = Router::new()
        .route("/subscriptions", post(subscriptions::purchase))
        .route("/subscriptions/mine", get(subscriptions::my_subscriptions))
        .route("/subscriptions/:id", get(subscriptions::get_subscription))
        .route("/subscriptions/:id/cancel", post(subscriptions::cancel));

    let admin = Router::new()
        .route("/transactions", get(admin::list_transactions))
        .route("/transactions/:id/verify", post(admin::verify))
        .route("/transactions/:id/reject", post(admin::reject))
        .route("/transactions/:id/settle", post(admin::settle))
        .route("/subscriptions/sweep-expired", post(admin::sweep_expired));

    Router::new()
        .merge(public)
        .merge(owners)
        .nest("/admin", admin)
        // Innermost layer's span is current in handlers, so principal_id lands there.
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
