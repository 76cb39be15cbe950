//! PostgreSQL ownership directory.
//!
//! Reads the `profiles` and `venue_owners` tables maintained by the
//! listings system.

use crate::rows::db_error;
use async_trait::async_trait;
use entitlements_core::providers::OwnershipDirectory;
use entitlements_core::{EntityId, PrincipalId, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL ownership directory.
#[derive(Clone)]
pub struct PostgresOwnershipDirectory {
    pool: PgPool,
}

impl PostgresOwnershipDirectory {
    /// Create a new directory.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnershipDirectory for PostgresOwnershipDirectory {
    async fn profile_owner(&self, profile: EntityId) -> Result<Option<PrincipalId>> {
        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT owner_principal_id FROM profiles WHERE id = $1")
                .bind(profile.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to read profile owner", &e))?;

        Ok(owner.map(PrincipalId::from_uuid))
    }

    async fn has_venue_grant(&self, principal: PrincipalId, venue: EntityId) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM venue_owners WHERE principal_id = $1 AND venue_id = $2)",
        )
        .bind(principal.as_uuid())
        .bind(venue.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to check venue grant", &e))
    }

    async fn profile_workplace(&self, profile: EntityId) -> Result<Option<EntityId>> {
        let venue: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT venue_id FROM profiles WHERE id = $1")
                .bind(profile.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to read profile workplace", &e))?;

        Ok(venue.flatten().map(EntityId::from_uuid))
    }

    async fn owned_profiles(&self, principal: PrincipalId) -> Result<Vec<EntityId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM profiles WHERE owner_principal_id = $1 ORDER BY id",
        )
        .bind(principal.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list owned profiles", &e))?;

        Ok(ids.into_iter().map(EntityId::from_uuid).collect())
    }

    async fn granted_venues(&self, principal: PrincipalId) -> Result<Vec<EntityId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT venue_id FROM venue_owners WHERE principal_id = $1 ORDER BY venue_id",
        )
        .bind(principal.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list granted venues", &e))?;

        Ok(ids.into_iter().map(EntityId::from_uuid).collect())
    }
}
