//! Notification sink.
//!
//! Delivery (email, push) belongs to another subsystem. The orchestrator
//! emits one [`Notification`] per lifecycle step and never lets a sink
//! failure affect the outcome.

use crate::error::Result;
use crate::types::{EntityRef, PaymentMethod, SubscriptionId, TransactionId};
use async_trait::async_trait;
use serde::Serialize;

/// Lifecycle signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A subscription was purchased and awaits payment.
    Purchased {
        /// New subscription
        subscription_id: SubscriptionId,
        /// Its transaction
        transaction_id: TransactionId,
        /// Entitled entity
        entity: EntityRef,
        /// Settlement method
        method: PaymentMethod,
    },
    /// Payment confirmed; the subscription is active.
    Confirmed {
        /// Subscription
        subscription_id: SubscriptionId,
        /// Settled transaction
        transaction_id: TransactionId,
        /// Entitled entity
        entity: EntityRef,
    },
    /// Payment rejected.
    Rejected {
        /// Subscription
        subscription_id: SubscriptionId,
        /// Rejected transaction
        transaction_id: TransactionId,
        /// Entitled entity
        entity: EntityRef,
        /// Administrator's reason
        reason: String,
    },
    /// Subscription cancelled.
    Cancelled {
        /// Subscription
        subscription_id: SubscriptionId,
        /// Entitled entity
        entity: EntityRef,
    },
}

impl Notification {
    /// Short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Purchased { .. } => "purchased",
            Self::Confirmed { .. } => "confirmed",
            Self::Rejected { .. } => "rejected",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// Fire-and-forget notification delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Hand off one notification.
    ///
    /// # Errors
    ///
    /// Returns `Collaborator` if the hand-off fails. Callers log and drop it.
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(kind = notification.kind(), ?notification, "Entitlement notification");
        Ok(())
    }
}
