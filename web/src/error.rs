//! Error types for web handlers.
//!
//! Bridges [`EntitlementError`] and HTTP responses through Axum's
//! `IntoResponse` trait.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use entitlements_core::EntitlementError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// Converts into a JSON `{code, message}` body. Server errors are logged
/// with their source and answered with a generic message.
///
/// # Examples
///
/// ```ignore
/// async fn handler(Path(kind): Path<String>) -> Result<Json<Data>, AppError> {
///     let kind: EntityKind = kind.parse()?;
///     Ok(Json(load(kind)))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// HTTP status this error responds with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHORIZED".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl From<EntitlementError> for AppError {
    fn from(err: EntitlementError) -> Self {
        let (status, code) = match &err {
            EntitlementError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            EntitlementError::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
            EntitlementError::StaleState { .. } => (StatusCode::CONFLICT, "STALE_STATE"),
            EntitlementError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            EntitlementError::UnknownTier { .. } => (StatusCode::BAD_REQUEST, "UNKNOWN_TIER"),
            EntitlementError::MethodUnavailable => {
                (StatusCode::BAD_REQUEST, "METHOD_UNAVAILABLE")
            }
            EntitlementError::InvalidMethod => (StatusCode::BAD_REQUEST, "INVALID_METHOD"),
            EntitlementError::AlreadyResolved => (StatusCode::BAD_REQUEST, "ALREADY_RESOLVED"),
            EntitlementError::NotActive => (StatusCode::BAD_REQUEST, "NOT_ACTIVE"),
            EntitlementError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            EntitlementError::TransactionCreateFailed(_)
            | EntitlementError::Storage(_)
            | EntitlementError::Collaborator(_) => {
                return Self::internal("An internal error occurred")
                    .with_source(anyhow::Error::new(err));
            }
        };

        Self::new(status, err.to_string(), code.to_string())
    }
}
