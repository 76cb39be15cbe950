//! Ownership verification.
//!
//! A principal may act on an entity if any resolver in an ordered chain
//! finds a linkage. Resolvers are tried in order and the first match wins,
//! so new delegation paths are added by pushing another resolver rather
//! than by touching the orchestrator.

use crate::error::Result;
use crate::providers::OwnershipDirectory;
use crate::types::{EntityKind, EntityRef, Principal};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// What the principal wants to do with the entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Buy an entitlement
    Purchase,
    /// Cancel an entitlement
    Cancel,
    /// Read an entitlement
    View,
}

/// One way of linking a principal to an entity.
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this resolver links `principal` to `entity` for `action`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the directory lookup fails.
    async fn resolve(&self, principal: &Principal, entity: EntityRef, action: Action)
    -> Result<bool>;

    /// Entities this resolver links to `principal`, used for "mine" listings.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the directory lookup fails.
    async fn owned(&self, _principal: &Principal) -> Result<Vec<EntityRef>> {
        Ok(Vec::new())
    }
}

/// Profile owner, or venue grant holder.
#[derive(Clone)]
pub struct DirectOwnership {
    directory: Arc<dyn OwnershipDirectory>,
}

impl DirectOwnership {
    /// Resolver over `directory`.
    pub fn new(directory: Arc<dyn OwnershipDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl OwnershipResolver for DirectOwnership {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn resolve(
        &self,
        principal: &Principal,
        entity: EntityRef,
        _action: Action,
    ) -> Result<bool> {
        match entity.kind {
            EntityKind::Profile => Ok(self.directory.profile_owner(entity.id).await?
                == Some(principal.id)),
            EntityKind::Venue => self.directory.has_venue_grant(principal.id, entity.id).await,
        }
    }

    async fn owned(&self, principal: &Principal) -> Result<Vec<EntityRef>> {
        let profiles = self.directory.owned_profiles(principal.id).await?;
        let venues = self.directory.granted_venues(principal.id).await?;

        Ok(profiles
            .into_iter()
            .map(EntityRef::profile)
            .chain(venues.into_iter().map(EntityRef::venue))
            .collect())
    }
}

/// Venue owners acting for the profiles that work at their venue.
#[derive(Clone)]
pub struct VenueDelegation {
    directory: Arc<dyn OwnershipDirectory>,
}

impl VenueDelegation {
    /// Resolver over `directory`.
    pub fn new(directory: Arc<dyn OwnershipDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl OwnershipResolver for VenueDelegation {
    fn name(&self) -> &'static str {
        "venue_delegation"
    }

    async fn resolve(
        &self,
        principal: &Principal,
        entity: EntityRef,
        _action: Action,
    ) -> Result<bool> {
        if entity.kind != EntityKind::Profile {
            return Ok(false);
        }

        match self.directory.profile_workplace(entity.id).await? {
            Some(venue) => self.directory.has_venue_grant(principal.id, venue).await,
            None => Ok(false),
        }
    }
}

/// Ordered resolver chain.
#[derive(Clone)]
pub struct OwnershipVerifier {
    resolvers: Vec<Arc<dyn OwnershipResolver>>,
}

impl OwnershipVerifier {
    /// Chain that tries `resolvers` in order.
    #[must_use]
    pub fn new(resolvers: Vec<Arc<dyn OwnershipResolver>>) -> Self {
        Self { resolvers }
    }

    /// Direct linkage first, then venue delegation.
    ///
    /// # Example
    ///
    /// ```
    /// use entitlements_core::mocks::MockOwnershipDirectory;
    /// use entitlements_core::{Action, EntityId, EntityRef, OwnershipVerifier, Principal, PrincipalId};
    /// use std::sync::Arc;
    ///
    /// let owner = Principal::member(PrincipalId::new());
    /// let profile = EntityId::new();
    /// let directory = MockOwnershipDirectory::new().with_profile(profile, owner.id);
    /// let verifier = OwnershipVerifier::standard(Arc::new(directory));
    ///
    /// tokio_test::block_on(async {
    ///     let entity = EntityRef::profile(profile);
    ///     assert!(verifier.authorize(&owner, entity, Action::Purchase).await);
    /// });
    /// ```
    #[must_use]
    pub fn standard(directory: Arc<dyn OwnershipDirectory>) -> Self {
        Self::new(vec![
            Arc::new(DirectOwnership::new(Arc::clone(&directory))),
            Arc::new(VenueDelegation::new(directory)),
        ])
    }

    /// Whether any resolver links `principal` to `entity`.
    ///
    /// Never fails: a resolver error is logged and counts as no linkage.
    pub async fn authorize(&self, principal: &Principal, entity: EntityRef, action: Action) -> bool {
        for resolver in &self.resolvers {
            match resolver.resolve(principal, entity, action).await {
                Ok(true) => {
                    tracing::debug!(
                        resolver = resolver.name(),
                        principal_id = %principal.id,
                        %entity,
                        ?action,
                        "Ownership resolved"
                    );
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        resolver = resolver.name(),
                        principal_id = %principal.id,
                        %entity,
                        error = %e,
                        "Ownership resolver failed, treating as no linkage"
                    );
                }
            }
        }
        false
    }

    /// Union of the entities every resolver links to `principal`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if a directory lookup fails.
    pub async fn owned_entities(&self, principal: &Principal) -> Result<Vec<EntityRef>> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for resolver in &self.resolvers {
            for entity in resolver.owned(principal).await? {
                if seen.insert(entity) {
                    entities.push(entity);
                }
            }
        }
        Ok(entities)
    }
}
