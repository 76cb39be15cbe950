//! Instant-payment QR collaborator.

use crate::types::SubscriptionId;
use async_trait::async_trait;
use thiserror::Error;

/// What the QR issuer needs to produce a payable code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrRequest {
    /// Subscription being paid for; also the payer's message
    pub subscription_id: SubscriptionId,
    /// Amount due
    pub amount: i64,
    /// Currency
    pub currency: String,
}

/// An issued payment code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrCode {
    /// Payload to render as a QR image
    pub qr_payload: String,
    /// Reference the external verifier settles against
    pub settlement_reference: String,
}

/// QR collaborator failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QrError {
    /// The collaborator has no configuration in this deployment.
    #[error("QR payment service is not configured")]
    NotConfigured,

    /// The collaborator was reached but did not issue a code.
    #[error("QR payment service failed: {0}")]
    Failed(String),
}

/// External QR-generation service.
#[async_trait]
pub trait QrPaymentService: Send + Sync {
    /// Capability flag checked before the method is offered.
    fn is_configured(&self) -> bool;

    /// Issue a code for one payment.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` if the service has no configuration
    /// - `Failed` for any other failure
    async fn issue(&self, request: QrRequest) -> Result<QrCode, QrError>;
}

/// Used when no QR endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledQrService;

#[async_trait]
impl QrPaymentService for DisabledQrService {
    fn is_configured(&self) -> bool {
        false
    }

    async fn issue(&self, _request: QrRequest) -> Result<QrCode, QrError> {
        Err(QrError::NotConfigured)
    }
}
