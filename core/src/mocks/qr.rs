//! Mock QR collaborator.

use crate::providers::{QrCode, QrError, QrPaymentService, QrRequest};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone)]
enum Mode {
    Configured,
    Unconfigured,
    /// Reports configured, then fails every issue.
    Failing(String),
    /// Reports configured, then answers `NotConfigured` (configuration removed mid-flight).
    Vanishing,
}

/// Mock QR service.
///
/// Issues deterministic codes derived from the subscription id and records
/// every request.
#[derive(Debug, Clone)]
pub struct MockQrService {
    mode: Mode,
    requests: Arc<Mutex<Vec<QrRequest>>>,
}

impl MockQrService {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Issues codes.
    #[must_use]
    pub fn configured() -> Self {
        Self::with_mode(Mode::Configured)
    }

    /// Not configured; the method is not offered.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self::with_mode(Mode::Unconfigured)
    }

    /// Configured, but every issue fails with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_mode(Mode::Failing(reason.into()))
    }

    /// Configured, but every issue reports `NotConfigured`.
    #[must_use]
    pub fn vanishing() -> Self {
        Self::with_mode(Mode::Vanishing)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<QrRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl QrPaymentService for MockQrService {
    fn is_configured(&self) -> bool {
        !matches!(self.mode, Mode::Unconfigured)
    }

    async fn issue(&self, request: QrRequest) -> Result<QrCode, QrError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        match &self.mode {
            Mode::Configured => Ok(QrCode {
                qr_payload: format!(
                    "SPD*1.0*AM:{}*CC:{}*MSG:{}",
                    request.amount, request.currency, request.subscription_id
                ),
                settlement_reference: format!("REF-{}", request.subscription_id),
            }),
            Mode::Unconfigured | Mode::Vanishing => Err(QrError::NotConfigured),
            Mode::Failing(reason) => Err(QrError::Failed(reason.clone())),
        }
    }
}
