//! Axum HTTP surface for the entitlements engine.
//!
//! # Request Flow
//!
//! 1. **Correlate**: every request gets an `X-Correlation-ID` and a span
//! 2. **Authenticate**: [`CurrentPrincipal`] resolves the bearer token
//! 3. **Parse**: path, query and body fields become domain types
//! 4. **Dispatch** to the [`LifecycleOrchestrator`](entitlements_core::LifecycleOrchestrator)
//! 5. **Map** the result, or the [`EntitlementError`](entitlements_core::EntitlementError),
//!    to a JSON response
//!
//! # Example
//!
//! ```ignore
//! let state = AppState::new(orchestrator, Arc::new(StaticTokenAuthenticator::from_spec(&tokens)?));
//! let app = build_router(state);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use auth::{Authenticator, StaticTokenAuthenticator, TokenSpecError};
pub use error::AppError;
pub use extractors::{BearerToken, CorrelationId, CurrentPrincipal};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use router::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
