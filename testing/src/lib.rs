//! # Entitlements Testing
//!
//! Testing utilities for the entitlements engine.
//!
//! This crate provides:
//! - [`TestHarness`]: an orchestrator over in-memory providers with seeded
//!   principals and entities
//! - [`test_clock`]: a deterministic, advanceable clock
//! - [`properties`]: proptest strategies for domain values and operation
//!   sequences
//!
//! ## Example
//!
//! ```ignore
//! use entitlements_testing::TestHarness;
//!
//! #[tokio::test]
//! async fn test_purchase_then_verify() {
//!     let h = TestHarness::new();
//!     let purchase = h.purchase_p1(PaymentMethod::ManualCash).await?;
//!
//!     let settled = h
//!         .orchestrator
//!         .confirm_manual(&h.admin, purchase.transaction.id, None)
//!         .await?;
//!     assert!(settled.consistent);
//! }
//! ```

pub mod harness;
pub mod properties;

use chrono::{DateTime, Utc};

pub use entitlements_core::mocks::{
    FixedClock, InMemoryEntitlements, MockOwnershipDirectory, MockQrService,
    RecordingNotificationSink,
};
pub use harness::TestHarness;

/// Create a fixed clock for tests (2025-01-01 00:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

/// Route `tracing` output through the test harness' captured writer.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use entitlements_core::Clock;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);

        clock.advance(Duration::hours(1));
        assert_eq!(clock.now() - time1, Duration::hours(1));
    }
}
