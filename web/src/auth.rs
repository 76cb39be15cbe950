//! Bearer-token authentication.
//!
//! Identity lives outside the engine. The [`Authenticator`] trait is the
//! seam: the server wires a [`StaticTokenAuthenticator`] built from
//! configuration, and a deployment behind an identity provider swaps in its
//! own implementation.

use async_trait::async_trait;
use entitlements_core::{Principal, PrincipalId, Role};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Resolves a bearer token to a principal.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The principal behind `token`, or `None` if it is unknown.
    async fn authenticate(&self, token: &str) -> Option<Principal>;
}

/// A token entry that could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenSpecError {
    /// The entry is not `token:principal_uuid:role`.
    #[error("Malformed token entry '{0}', expected token:principal_uuid:role")]
    Malformed(String),

    /// The principal id is not a UUID.
    #[error("Invalid principal id '{0}'")]
    InvalidPrincipal(String),

    /// The role is not one of member, admin, service.
    #[error("Invalid role '{0}'")]
    InvalidRole(String),
}

/// Fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    /// Parse a comma-separated list of `token:principal_uuid:role` entries.
    ///
    /// Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TokenSpecError`] for the first entry that does not parse.
    pub fn from_spec(spec: &str) -> Result<Self, TokenSpecError> {
        let mut authenticator = Self::new();

        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.splitn(3, ':');
            let (Some(token), Some(id), Some(role)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(TokenSpecError::Malformed(entry.to_string()));
            };
            if token.is_empty() {
                return Err(TokenSpecError::Malformed(entry.to_string()));
            }

            let id = Uuid::parse_str(id)
                .map_err(|_| TokenSpecError::InvalidPrincipal(id.to_string()))?;
            let role: Role = role
                .parse()
                .map_err(|_| TokenSpecError::InvalidRole(role.to_string()))?;

            authenticator.tokens.insert(
                token.to_string(),
                Principal {
                    id: PrincipalId::from_uuid(id),
                    role,
                },
            );
        }

        Ok(authenticator)
    }

    /// Number of known tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no tokens are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Option<Principal> {
        self.tokens.get(token).copied()
    }
}
