//! In-memory providers for tests and local development.
//!
//! Everything here keeps its state behind `Arc<Mutex<_>>`, so clones share
//! state and a test can hold one handle while the orchestrator holds another.

pub mod clock;
pub mod directory;
pub mod entitlements;
pub mod notify;
pub mod qr;

pub use clock::FixedClock;
pub use directory::MockOwnershipDirectory;
pub use entitlements::InMemoryEntitlements;
pub use notify::RecordingNotificationSink;
pub use qr::MockQrService;
