//! Ownership directory trait.

use crate::error::Result;
use crate::types::{EntityId, PrincipalId};
use async_trait::async_trait;

/// Read-only view of the listings system's ownership links.
///
/// Profiles have exactly one owner. Venues have any number of granted
/// owners. A profile may currently work at one venue.
#[async_trait]
pub trait OwnershipDirectory: Send + Sync {
    /// Owner of a profile, `None` if the profile does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lookup fails.
    async fn profile_owner(&self, profile: EntityId) -> Result<Option<PrincipalId>>;

    /// Whether `principal` holds an ownership grant on `venue`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lookup fails.
    async fn has_venue_grant(&self, principal: PrincipalId, venue: EntityId) -> Result<bool>;

    /// Venue a profile currently works at.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lookup fails.
    async fn profile_workplace(&self, profile: EntityId) -> Result<Option<EntityId>>;

    /// Profiles owned by `principal`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lookup fails.
    async fn owned_profiles(&self, principal: PrincipalId) -> Result<Vec<EntityId>>;

    /// Venues `principal` holds grants for.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lookup fails.
    async fn granted_venues(&self, principal: PrincipalId) -> Result<Vec<EntityId>>;
}
