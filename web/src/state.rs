//! Application state for Axum handlers.

use crate::auth::Authenticator;
use entitlements_core::LifecycleOrchestrator;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Entitlement lifecycle operations
    pub orchestrator: Arc<LifecycleOrchestrator>,
    /// Bearer-token resolution
    pub authenticator: Arc<dyn Authenticator>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        orchestrator: LifecycleOrchestrator,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            authenticator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Axum clones the state per request
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
