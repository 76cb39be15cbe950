//! Provider traits for everything the orchestrator does not compute itself.
//!
//! Providers are **interfaces**, not implementations. The orchestrator holds
//! them as trait objects; `entitlements-postgres` supplies the storage
//! implementations and [`crate::mocks`] the in-memory ones.
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │ EntitlementStore     │      │ TransactionLedger    │
//! │  subscriptions       │◄────►│  payment_transactions│
//! └──────────────────────┘ link └──────────────────────┘
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │ OwnershipDirectory   │      │ QrPaymentService     │
//! │  profile/venue links │      │  external QR issuer  │
//! └──────────────────────┘      └──────────────────────┘
//!             ┌──────────────────────┐
//!             │ NotificationSink     │
//!             │  fire-and-forget     │
//!             └──────────────────────┘
//! ```

pub mod directory;
pub mod ledger;
pub mod notify;
pub mod qr;
pub mod store;

pub use directory::OwnershipDirectory;
pub use ledger::TransactionLedger;
pub use notify::{Notification, NotificationSink, TracingNotificationSink};
pub use qr::{DisabledQrService, QrCode, QrError, QrPaymentService, QrRequest};
pub use store::EntitlementStore;
