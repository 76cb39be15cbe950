//! HTTP surface tests driving the router with `oneshot`.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use entitlements_testing::{MockQrService, TestHarness};
use entitlements_web::{AppState, CORRELATION_ID_HEADER, StaticTokenAuthenticator, build_router};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::span;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, registry};

const OWNER: &str = "owner-token";
const VENUE_OWNER: &str = "venue-owner-token";
const ADMIN: &str = "admin-token";
const VERIFIER: &str = "verifier-token";
const STRANGER: &str = "stranger-token";

fn app(h: &TestHarness) -> Router {
    let authenticator = StaticTokenAuthenticator::new()
        .with_token(OWNER, h.owner)
        .with_token(VENUE_OWNER, h.venue_owner)
        .with_token(ADMIN, h.admin)
        .with_token(VERIFIER, h.verifier)
        .with_token(STRANGER, h.stranger);

    build_router(AppState::new(h.orchestrator.clone(), Arc::new(authenticator)))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn purchase_body(kind: &str, id: impl ToString, tier: &str, method: &str) -> Value {
    json!({
        "entity_kind": kind,
        "entity_id": id.to_string(),
        "tier": tier,
        "payment_method": method,
    })
}

#[tokio::test]
async fn test_pricing_is_public() {
    let h = TestHarness::new();
    let app = app(&h);

    let (status, body) = send(&app, Method::GET, "/pricing/venue", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entity_kind"], "venue");
    let quotes = body["quotes"].as_array().unwrap();
    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes[0]["price"], 499);

    let (status, body) = send(&app, Method::GET, "/pricing/yacht", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_payment_methods_follow_configuration() {
    let h = TestHarness::with_qr(MockQrService::unconfigured());
    let app = app(&h);

    let (status, body) = send(&app, Method::GET, "/payment-methods", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["methods"], json!(["manual_cash"]));

    let (status, body) = send(
        &app,
        Method::POST,
        "/subscriptions",
        Some(OWNER),
        Some(purchase_body("profile", h.p1, "short", "instant_qr")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "METHOD_UNAVAILABLE");
    assert_eq!(h.entitlements.subscription_count(), 0);
}

#[tokio::test]
async fn test_authentication_is_required() {
    let h = TestHarness::new();
    let app = app(&h);

    let (status, _) = send(&app, Method::GET, "/subscriptions/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/subscriptions/mine", Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

/// Scenarios A to F over HTTP.
#[tokio::test]
async fn test_purchase_verify_cancel_flow() {
    let h = TestHarness::new();
    let app = app(&h);

    // A: purchase
    let (status, a) = send(
        &app,
        Method::POST,
        "/subscriptions",
        Some(OWNER),
        Some(purchase_body("profile", h.p1, "short", "manual_cash")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(a["subscription"]["status"], "pending_payment");
    assert_eq!(a["subscription"]["price_paid"], 299);
    assert_eq!(a["transaction"]["payment_status"], "pending");
    let subscription_id = a["subscription"]["id"].as_str().unwrap().to_string();
    let transaction_id = a["transaction"]["id"].as_str().unwrap().to_string();

    // B: second purchase conflicts
    let (status, b) = send(
        &app,
        Method::POST,
        "/subscriptions",
        Some(OWNER),
        Some(purchase_body("profile", h.p1, "medium", "instant_qr")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(b["code"], "CONFLICT");

    // C: manual verify of an instant transaction
    let (status, instant) = send(
        &app,
        Method::POST,
        "/subscriptions",
        Some(VENUE_OWNER),
        Some(purchase_body("venue", h.v1, "short", "instant_qr")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(instant["transaction"]["qr_payload"].is_string());
    let instant_id = instant["transaction"]["id"].as_str().unwrap();

    let (status, c) = send(
        &app,
        Method::POST,
        &format!("/admin/transactions/{instant_id}/verify"),
        Some(ADMIN),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(c["code"], "INVALID_METHOD");

    // D: verify activates
    let (status, d) = send(
        &app,
        Method::POST,
        &format!("/admin/transactions/{transaction_id}/verify"),
        Some(ADMIN),
        Some(json!({ "admin_notes": "paid at reception" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(d["consistent"], true);
    assert_eq!(d["subscription"]["status"], "active");
    assert_eq!(d["transaction"]["payment_status"], "completed");
    assert_eq!(d["transaction"]["admin_notes"], "paid at reception");

    // E: verify again
    let (status, e) = send(
        &app,
        Method::POST,
        &format!("/admin/transactions/{transaction_id}/verify"),
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(e["code"], "ALREADY_RESOLVED");

    // F: cancel, then cancel again
    let cancel_uri = format!("/subscriptions/{subscription_id}/cancel");
    let (status, f) = send(
        &app,
        Method::POST,
        &cancel_uri,
        Some(OWNER),
        Some(json!({ "entity_kind": "profile" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(f["status"], "cancelled");

    let (status, again) = send(
        &app,
        Method::POST,
        &cancel_uri,
        Some(OWNER),
        Some(json!({ "entity_kind": "profile" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(again["code"], "NOT_ACTIVE");
}

#[tokio::test]
async fn test_purchase_validation_and_authorization() {
    let h = TestHarness::new();
    let app = app(&h);

    let (status, body) = send(
        &app,
        Method::POST,
        "/subscriptions",
        Some(OWNER),
        Some(purchase_body("profile", h.p1, "eternal", "manual_cash")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = send(
        &app,
        Method::POST,
        "/subscriptions",
        Some(OWNER),
        Some(purchase_body("profile", "not-a-uuid", "short", "manual_cash")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = send(
        &app,
        Method::POST,
        "/subscriptions",
        Some(STRANGER),
        Some(purchase_body("profile", h.p1, "short", "manual_cash")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(h.entitlements.subscription_count(), 0);
}

#[tokio::test]
async fn test_reject_requires_reason_and_admin() {
    let h = TestHarness::new();
    let app = app(&h);
    let purchase = h.purchase_p1(entitlements_core::PaymentMethod::ManualCash).await.unwrap();
    let uri = format!("/admin/transactions/{}/reject", purchase.transaction.id);

    let (status, body) = send(&app, Method::POST, &uri, Some(OWNER), Some(json!({"admin_notes": "x"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = send(&app, Method::POST, &uri, Some(ADMIN), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(ADMIN),
        Some(json!({ "admin_notes": "envelope was empty" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription"]["status"], "failed");
    assert_eq!(body["transaction"]["payment_status"], "failed");

    let missing = format!("/admin/transactions/{}/reject", uuid::Uuid::new_v4());
    let (status, _) = send(
        &app,
        Method::POST,
        &missing,
        Some(ADMIN),
        Some(json!({ "admin_notes": "no" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_verifier_settles_instant_payment() {
    let h = TestHarness::new();
    let app = app(&h);
    let purchase = h.purchase_p1(entitlements_core::PaymentMethod::InstantQr).await.unwrap();
    let reference = purchase.transaction.settlement_reference.clone().unwrap();
    let uri = format!("/admin/transactions/{}/settle", purchase.transaction.id);

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(VERIFIER),
        Some(json!({ "settlement_reference": "REF-wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(VERIFIER),
        Some(json!({ "settlement_reference": reference })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription"]["status"], "active");

    // The verifier has no other admin rights.
    let (status, _) = send(&app, Method::GET, "/admin/transactions", Some(VERIFIER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reads_mine_detail_vip_and_listing() {
    let h = TestHarness::new();
    let app = app(&h);
    let active = h.active_p1().await.unwrap();
    h.orchestrator
        .purchase(
            &h.venue_owner,
            entitlements_core::PurchaseRequest {
                entity: entitlements_core::EntityRef::venue(h.v1),
                tier: entitlements_core::Tier::Short,
                method: entitlements_core::PaymentMethod::InstantQr,
            },
        )
        .await
        .unwrap();

    let (status, mine) = send(&app, Method::GET, "/subscriptions/mine", Some(OWNER), None).await;
    assert_eq!(status, StatusCode::OK);
    let mine = mine["subscriptions"].as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["effective_status"], "active");

    let detail_uri = format!("/subscriptions/{}", active.subscription.id);
    let (status, detail) = send(&app, Method::GET, &detail_uri, Some(OWNER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["transaction"]["payment_status"], "completed");

    let (status, _) = send(&app, Method::GET, &detail_uri, Some(STRANGER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let vip_uri = format!("/entities/profile/{}/vip", h.p1);
    let (status, vip) = send(&app, Method::GET, &vip_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vip["vip"], true);
    assert!(vip["expires_at"].is_string());

    let (status, page) = send(
        &app,
        Method::GET,
        "/admin/transactions?method=instant_qr&status=pending&limit=500",
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["limit"], 200);
    let rows = page["transactions"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["entity_kind"], "venue");
    assert_eq!(rows[0]["tier"], "short");
    assert_eq!(rows[0]["subscription_status"], "pending_payment");

    let (status, _) = send(&app, Method::GET, "/admin/transactions", Some(OWNER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sweep_expired_over_http() {
    let h = TestHarness::new();
    let app = app(&h);
    h.active_p1().await.unwrap();
    h.clock.advance(chrono::Duration::days(45));

    let (status, body) = send(
        &app,
        Method::POST,
        "/admin/subscriptions/sweep-expired",
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["swept"], 1);

    let vip_uri = format!("/entities/profile/{}/vip", h.p1);
    let (_, vip) = send(&app, Method::GET, &vip_uri, None, None).await;
    assert_eq!(vip["vip"], false);
}

#[tokio::test]
async fn test_health_and_correlation_header() {
    let h = TestHarness::new();
    let app = app(&h);

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    let id = uuid::Uuid::new_v4();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(CORRELATION_ID_HEADER, id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers().get(CORRELATION_ID_HEADER).unwrap(),
        id.to_string().as_str()
    );
}

/// Collects every value recorded into a `principal_id` span field.
#[derive(Clone, Default)]
struct PrincipalFieldRecorder(Arc<Mutex<Vec<String>>>);

impl Visit for PrincipalFieldRecorder {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "principal_id" {
            self.0.lock().unwrap().push(format!("{value:?}"));
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for PrincipalFieldRecorder {
    fn on_record(&self, _span: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
        values.record(&mut self.clone());
    }
}

#[tokio::test]
async fn test_authenticated_principal_is_recorded_on_request_span() {
    let recorder = PrincipalFieldRecorder::default();
    let _guard = tracing::subscriber::set_default(registry().with(recorder.clone()));

    let h = TestHarness::new();
    let app = app(&h);
    let (status, _) = send(&app, Method::GET, "/subscriptions/mine", Some(OWNER), None).await;
    assert_eq!(status, StatusCode::OK);

    let recorded = recorder.0.lock().unwrap().clone();
    assert_eq!(recorded, vec![h.owner.id.to_string()]);
}
