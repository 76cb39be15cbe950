//! # Entitlements Core
//!
//! Sells a time-bounded VIP entitlement to a profile or a venue, collects
//! payment through one of two settlement methods, and keeps at most one live
//! subscription per entity.
//!
//! ## Architecture
//!
//! The crate follows the "functional core, imperative shell" split:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ LifecycleOrchestrator (saga, I/O through providers)      │
//! │   purchase · confirm_manual · confirm_instant · reject   │
//! │   cancel · listings · sweep                              │
//! ├──────────────────────────────────────────────────────────┤
//! │ Pure core                                                │
//! │   PricingCatalog · lifecycle::plan · Subscription views  │
//! ├──────────────────────────────────────────────────────────┤
//! │ Providers (traits)                                       │
//! │   EntitlementStore · TransactionLedger                   │
//! │   OwnershipDirectory · QrPaymentService                  │
//! │   NotificationSink · Clock                               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Providers are interfaces. `entitlements-postgres` implements the storage
//! ones; [`mocks`] carries in-memory versions for tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! let orchestrator = LifecycleOrchestrator::new(environment);
//!
//! let purchase = orchestrator
//!     .purchase(&principal, PurchaseRequest {
//!         entity: EntityRef::profile(profile_id),
//!         tier: Tier::Short,
//!         method: PaymentMethod::ManualCash,
//!     })
//!     .await?;
//!
//! assert_eq!(purchase.subscription.status, SubscriptionStatus::PendingPayment);
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod orchestrator;
pub mod ownership;
pub mod pricing;
pub mod providers;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use environment::{Clock, SystemClock};
pub use error::{EntitlementError, Result};
pub use orchestrator::{
    LifecycleEnvironment, LifecycleOrchestrator, Purchase, PurchaseRequest, Settlement,
    SubscriptionDetail, VipStatus,
};
pub use ownership::{Action, DirectOwnership, OwnershipResolver, OwnershipVerifier, VenueDelegation};
pub use pricing::{PricingCatalog, Quote};
pub use types::{
    EntityId, EntityKind, EntityRef, PaymentMethod, PaymentStatus, PaymentTransaction, Principal,
    PrincipalId, Role, Subscription, SubscriptionId, SubscriptionStatus, SubscriptionView, Tier,
    TransactionFilter, TransactionId, TransactionListing,
};
