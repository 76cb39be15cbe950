//! Environment traits injected into the orchestrator.
//!
//! Only time lives here; storage and collaborators are in [`crate::providers`].

use chrono::{DateTime, Utc};

/// Clock trait for time operations
///
/// Abstracts over system time to make expiry and resolution timestamps
/// deterministic in tests.
///
/// # Example
///
/// ```
/// use entitlements_core::environment::Clock;
/// use chrono::{DateTime, Utc};
///
/// struct FixedClock {
///     time: DateTime<Utc>,
/// }
///
/// impl Clock for FixedClock {
///     fn now(&self) -> DateTime<Utc> {
///         self.time
///     }
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
