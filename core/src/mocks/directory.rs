//! Mock ownership directory.

use crate::error::Result;
use crate::providers::OwnershipDirectory;
use crate::types::{EntityId, PrincipalId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Static ownership links, assembled with builder methods.
///
/// # Example
///
/// ```
/// use entitlements_core::mocks::MockOwnershipDirectory;
/// use entitlements_core::{EntityId, PrincipalId};
///
/// let owner = PrincipalId::new();
/// let profile = EntityId::new();
/// let directory = MockOwnershipDirectory::new().with_profile(profile, owner);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockOwnershipDirectory {
    profile_owners: HashMap<EntityId, PrincipalId>,
    workplaces: HashMap<EntityId, EntityId>,
    venue_grants: HashSet<(PrincipalId, EntityId)>,
}

impl MockOwnershipDirectory {
    /// Empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a profile owned by `owner`.
    #[must_use]
    pub fn with_profile(mut self, profile: EntityId, owner: PrincipalId) -> Self {
        self.profile_owners.insert(profile, owner);
        self
    }

    /// Grant `principal` ownership of `venue`.
    #[must_use]
    pub fn with_venue_grant(mut self, venue: EntityId, principal: PrincipalId) -> Self {
        self.venue_grants.insert((principal, venue));
        self
    }

    /// Record that `profile` works at `venue`.
    #[must_use]
    pub fn with_workplace(mut self, profile: EntityId, venue: EntityId) -> Self {
        self.workplaces.insert(profile, venue);
        self
    }
}

#[async_trait]
impl OwnershipDirectory for MockOwnershipDirectory {
    async fn profile_owner(&self, profile: EntityId) -> Result<Option<PrincipalId>> {
        Ok(self.profile_owners.get(&profile).copied())
    }

    async fn has_venue_grant(&self, principal: PrincipalId, venue: EntityId) -> Result<bool> {
        Ok(self.venue_grants.contains(&(principal, venue)))
    }

    async fn profile_workplace(&self, profile: EntityId) -> Result<Option<EntityId>> {
        Ok(self.workplaces.get(&profile).copied())
    }

    async fn owned_profiles(&self, principal: PrincipalId) -> Result<Vec<EntityId>> {
        let mut profiles: Vec<EntityId> = self
            .profile_owners
            .iter()
            .filter(|(_, owner)| **owner == principal)
            .map(|(profile, _)| *profile)
            .collect();
        profiles.sort_by_key(|id| *id.as_uuid());
        Ok(profiles)
    }

    async fn granted_venues(&self, principal: PrincipalId) -> Result<Vec<EntityId>> {
        let mut venues: Vec<EntityId> = self
            .venue_grants
            .iter()
            .filter(|(holder, _)| *holder == principal)
            .map(|(_, venue)| *venue)
            .collect();
        venues.sort_by_key(|id| *id.as_uuid());
        Ok(venues)
    }
}
