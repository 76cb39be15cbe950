//! HTTP client for the external QR-issuing service.
//!
//! `POST {endpoint}` with `{subscription_id, amount, currency}` and, when a
//! key is configured, `Authorization: Bearer <key>`. The service answers
//! `{qr_payload, settlement_reference}`.

use crate::config::InstantQrConfig;
use async_trait::async_trait;
use entitlements_core::SubscriptionId;
use entitlements_core::providers::{
    DisabledQrService, QrCode, QrError, QrPaymentService, QrRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct IssueRequest<'a> {
    subscription_id: SubscriptionId,
    amount: i64,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    qr_payload: String,
    settlement_reference: String,
}

/// QR collaborator reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpQrService {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpQrService {
    /// Create a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl QrPaymentService for HttpQrService {
    fn is_configured(&self) -> bool {
        true
    }

    async fn issue(&self, request: QrRequest) -> Result<QrCode, QrError> {
        let mut call = self.http_client.post(&self.endpoint).json(&IssueRequest {
            subscription_id: request.subscription_id,
            amount: request.amount,
            currency: &request.currency,
        });
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call
            .send()
            .await
            .map_err(|e| QrError::Failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "QR issue request rejected");
            return Err(QrError::Failed(format!("QR service answered {status}")));
        }

        let issued: IssueResponse = response
            .json()
            .await
            .map_err(|e| QrError::Failed(format!("Malformed QR response: {e}")))?;

        if issued.settlement_reference.trim().is_empty() {
            return Err(QrError::Failed("QR response without reference".to_string()));
        }

        Ok(QrCode {
            qr_payload: issued.qr_payload,
            settlement_reference: issued.settlement_reference,
        })
    }
}

/// The collaborator for this deployment: HTTP when an endpoint is set,
/// otherwise disabled.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn from_config(config: &InstantQrConfig) -> Result<Arc<dyn QrPaymentService>, reqwest::Error> {
    match &config.endpoint {
        Some(endpoint) => {
            tracing::info!(%endpoint, "Instant QR payments enabled");
            Ok(Arc::new(HttpQrService::new(
                endpoint.clone(),
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        None => {
            tracing::info!("Instant QR payments disabled (INSTANT_QR_ENDPOINT unset)");
            Ok(Arc::new(DisabledQrService))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/issue")
    }

    fn request() -> QrRequest {
        QrRequest {
            subscription_id: SubscriptionId::new(),
            amount: 299,
            currency: "CZK".to_string(),
        }
    }

    #[tokio::test]
    async fn test_issue_sends_request_and_key() {
        let app = Router::new().route(
            "/issue",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer secret");
                Json(json!({
                    "qr_payload": format!("SPD*1.0*AM:{}*CC:{}", body["amount"], body["currency"].as_str().unwrap_or("")),
                    "settlement_reference": if authorized { "REF-OK" } else { "REF-ANON" },
                }))
            }),
        );
        let endpoint = spawn(app).await;

        let service =
            HttpQrService::new(endpoint, Some("secret".to_string()), Duration::from_secs(5))
                .unwrap();
        let code = service.issue(request()).await.unwrap();

        assert_eq!(code.qr_payload, "SPD*1.0*AM:299*CC:CZK");
        assert_eq!(code.settlement_reference, "REF-OK");
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        let app = Router::new().route(
            "/issue",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream bank down") }),
        );
        let endpoint = spawn(app).await;

        let service = HttpQrService::new(endpoint, None, Duration::from_secs(5)).unwrap();
        let err = service.issue(request()).await.unwrap_err();

        assert!(matches!(err, QrError::Failed(reason) if reason.contains("502")));
    }

    #[test]
    fn test_from_config_without_endpoint_is_disabled() {
        let service = from_config(&InstantQrConfig {
            endpoint: None,
            api_key: None,
            timeout_secs: 10,
        })
        .unwrap();
        assert!(!service.is_configured());
    }
}
