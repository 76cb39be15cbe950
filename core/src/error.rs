//! Error taxonomy for the entitlement engine.

use crate::types::SubscriptionStatus;
use thiserror::Error;

/// Result type alias for entitlement operations.
pub type Result<T> = std::result::Result<T, EntitlementError>;

/// Every way an entitlement operation can fail.
///
/// Validation and authorization failures are detected before any write.
/// `TransactionCreateFailed` is the only variant returned after a partial
/// write, and only once the compensating delete has been attempted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    // ═══════════════════════════════════════════════════════════
    // Rejections before any write
    // ═══════════════════════════════════════════════════════════

    /// The principal has no linkage to the entity, or lacks the role.
    #[error("Forbidden")]
    Forbidden,

    /// The entity already has a pending or active subscription.
    #[error("Entity already has a pending or active subscription")]
    Conflict,

    /// A request field could not be understood.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// What was wrong
        reason: String,
    },

    /// The tier is not in the catalog.
    #[error("Unknown tier: {tier}")]
    UnknownTier {
        /// Offending label
        tier: String,
    },

    /// The instant-payment collaborator is not configured.
    #[error("Payment method unavailable")]
    MethodUnavailable,

    /// A referenced record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of record
        resource: &'static str,
        /// Requested id
        id: String,
    },

    /// The operation does not apply to this transaction's method.
    #[error("Operation not valid for this payment method")]
    InvalidMethod,

    // ═══════════════════════════════════════════════════════════
    // Race guards
    // ═══════════════════════════════════════════════════════════

    /// The transaction has already reached a terminal status.
    #[error("Transaction already resolved")]
    AlreadyResolved,

    /// A conditional subscription transition found an unexpected status.
    #[error("Subscription is {actual}, expected {expected}")]
    StaleState {
        /// Status the caller expected
        expected: SubscriptionStatus,
        /// Status actually stored
        actual: SubscriptionStatus,
    },

    /// Cancellation requires an active subscription.
    #[error("Subscription is not active")]
    NotActive,

    // ═══════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════

    /// Creating the payment transaction failed; the subscription was rolled back.
    #[error("Transaction creation failed: {0}")]
    TransactionCreateFailed(String),

    /// Backing store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An external collaborator failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

impl EntitlementError {
    /// Shorthand for [`EntitlementError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`EntitlementError::NotFound`].
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Returns `true` for the routine losers of a concurrent race.
    ///
    /// # Examples
    ///
    /// ```
    /// # use entitlements_core::EntitlementError;
    /// assert!(EntitlementError::AlreadyResolved.is_race_outcome());
    /// assert!(!EntitlementError::Forbidden.is_race_outcome());
    /// ```
    pub const fn is_race_outcome(&self) -> bool {
        matches!(
            self,
            Self::AlreadyResolved | Self::StaleState { .. } | Self::Conflict
        )
    }

    /// Returns `true` if the caller, not the system, is at fault.
    ///
    /// # Examples
    ///
    /// ```
    /// # use entitlements_core::EntitlementError;
    /// assert!(EntitlementError::NotActive.is_client_error());
    /// assert!(!EntitlementError::Storage("down".into()).is_client_error());
    /// ```
    pub const fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::TransactionCreateFailed(_) | Self::Storage(_) | Self::Collaborator(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_errors_are_not_client_errors() {
        assert!(!EntitlementError::TransactionCreateFailed("x".into()).is_client_error());
        assert!(!EntitlementError::Collaborator("x".into()).is_client_error());
        assert!(EntitlementError::Conflict.is_client_error());
        assert!(EntitlementError::not_found("subscription", "abc").is_client_error());
    }

    #[test]
    fn test_stale_state_message_names_both_statuses() {
        let err = EntitlementError::StaleState {
            expected: SubscriptionStatus::PendingPayment,
            actual: SubscriptionStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "Subscription is cancelled, expected pending_payment");
        assert!(err.is_race_outcome());
    }
}
