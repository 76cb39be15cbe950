//! Static pricing catalog.
//!
//! Maps `(entity kind, tier)` to a price and a duration. The table is fixed
//! configuration; only the currency label comes from the environment.

use crate::error::{EntitlementError, Result};
use crate::types::{EntityKind, Tier};
use chrono::Duration;
use serde::Serialize;

/// Currency used when none is configured.
pub const DEFAULT_CURRENCY: &str = "CZK";

/// A catalog entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Quote {
    /// Entity kind the price applies to
    pub entity_kind: EntityKind,
    /// Tier the price applies to
    pub tier: Tier,
    /// Whole units of `currency`
    pub price: i64,
    /// Currency label
    pub currency: String,
    /// Length of the entitlement in days
    pub duration_days: i64,
}

impl Quote {
    /// Entitlement length.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::days(self.duration_days)
    }
}

/// Pure lookup of prices.
#[derive(Clone, Debug)]
pub struct PricingCatalog {
    currency: String,
}

impl PricingCatalog {
    /// Catalog quoting in `currency`.
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    /// Currency label.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Quote one tier.
    ///
    /// Every `Tier` is priced for every `EntityKind`, so this never fails
    /// for typed input; see [`PricingCatalog::quote_by_label`] for strings.
    #[must_use]
    pub fn quote(&self, entity_kind: EntityKind, tier: Tier) -> Quote {
        let (price, duration_days) = match (entity_kind, tier) {
            (EntityKind::Profile, Tier::Short) => (299, 30),
            (EntityKind::Profile, Tier::Medium) => (799, 90),
            (EntityKind::Profile, Tier::Long) => (1499, 180),
            (EntityKind::Venue, Tier::Short) => (499, 30),
            (EntityKind::Venue, Tier::Medium) => (1299, 90),
            (EntityKind::Venue, Tier::Long) => (2399, 180),
        };

        Quote {
            entity_kind,
            tier,
            price,
            currency: self.currency.clone(),
            duration_days,
        }
    }

    /// Quote a tier given by its label.
    ///
    /// # Errors
    ///
    /// Returns [`EntitlementError::UnknownTier`] if the label is not a tier.
    pub fn quote_by_label(&self, entity_kind: EntityKind, tier: &str) -> Result<Quote> {
        let tier = tier
            .parse::<Tier>()
            .map_err(|_| EntitlementError::UnknownTier {
                tier: tier.to_string(),
            })?;
        Ok(self.quote(entity_kind, tier))
    }

    /// All tiers for one entity kind, shortest first.
    #[must_use]
    pub fn quotes_for(&self, entity_kind: EntityKind) -> Vec<Quote> {
        Tier::ALL
            .iter()
            .map(|tier| self.quote(entity_kind, *tier))
            .collect()
    }
}

impl Default for PricingCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY)
    }
}
