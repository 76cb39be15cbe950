//! Business metrics for the entitlement lifecycle.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `entitlements_purchases_total{entity_kind,method}` - Purchases that reached `pending_payment`
//! - `entitlements_confirmations_total{method}` - Payments confirmed
//! - `entitlements_rejections_total` - Payments rejected
//! - `entitlements_cancellations_total` - Subscriptions cancelled
//! - `entitlements_rollbacks_total{outcome}` - Compensating deletes (`ok`, `failed`)
//! - `entitlements_inconsistencies_total{kind}` - States left for operator review
//! - `entitlements_expired_swept_total` - Subscriptions moved to `expired` by a sweep
//!
//! Without an installed recorder (tests) every call is a no-op.

use crate::types::{EntityKind, PaymentMethod};
use metrics::describe_counter;

/// Register all business metric descriptions.
///
/// Call once at startup, after installing the recorder.
pub fn register_business_metrics() {
    describe_counter!(
        "entitlements_purchases_total",
        "Subscriptions purchased, by entity kind and payment method"
    );
    describe_counter!(
        "entitlements_confirmations_total",
        "Payments confirmed, by payment method"
    );
    describe_counter!("entitlements_rejections_total", "Payments rejected by an administrator");
    describe_counter!("entitlements_cancellations_total", "Subscriptions cancelled");
    describe_counter!(
        "entitlements_rollbacks_total",
        "Compensating subscription deletes after a failed purchase, by outcome"
    );
    describe_counter!(
        "entitlements_inconsistencies_total",
        "Subscription/transaction divergences needing operator review, by kind"
    );
    describe_counter!(
        "entitlements_expired_swept_total",
        "Active subscriptions moved to expired by a sweep"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a completed purchase.
pub fn record_purchase(entity_kind: EntityKind, method: PaymentMethod) {
    metrics::counter!(
        "entitlements_purchases_total",
        "entity_kind" => entity_kind.as_str(),
        "method" => method.as_str()
    )
    .increment(1);
}

/// Record a confirmed payment.
pub fn record_confirmation(method: PaymentMethod) {
    metrics::counter!("entitlements_confirmations_total", "method" => method.as_str()).increment(1);
}

/// Record a rejected payment.
pub fn record_rejection() {
    metrics::counter!("entitlements_rejections_total").increment(1);
}

/// Record a cancellation.
pub fn record_cancellation() {
    metrics::counter!("entitlements_cancellations_total").increment(1);
}

/// Record a compensating delete.
///
/// # Arguments
///
/// * `succeeded` - Whether the delete went through
pub fn record_rollback(succeeded: bool) {
    let outcome = if succeeded { "ok" } else { "failed" };
    metrics::counter!("entitlements_rollbacks_total", "outcome" => outcome).increment(1);
}

/// Record a state left for operator review.
///
/// # Arguments
///
/// * `kind` - e.g. `orphan_subscription`, `unlinked_transaction`, `resolution_diverged`
pub fn record_inconsistency(kind: &'static str) {
    metrics::counter!("entitlements_inconsistencies_total", "kind" => kind).increment(1);
}

/// Record a sweep.
pub fn record_expired_swept(count: u64) {
    metrics::counter!("entitlements_expired_swept_total").increment(count);
}
