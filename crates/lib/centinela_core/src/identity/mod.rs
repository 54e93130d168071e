//! Identity federation.
//!
//! The external identity provider is a black box with two calls: verify a
//! provider-issued token, and look a user up by uid. Resolvers wrap an
//! identity source and answer [`Lookup::Found`] or [`Lookup::NotFound`];
//! anything else is an [`IdentityError`] and stops the resolver chain.

pub mod memory;
pub mod toolkit;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::auth::Identity;
use crate::store::LearningPlatformDirectory;

/// User as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub uid: String,
    pub email: String,
}

/// Identity provider failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("user not found")]
    NotFound,

    #[error("provider rejected token: {0}")]
    InvalidToken(String),

    #[error("identity provider error: {0}")]
    Other(String),
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a provider-issued token and return the user it belongs to.
    async fn verify_token(&self, raw_token: &str) -> Result<ProviderUser, ProviderError>;

    async fn get_user(&self, uid: &str) -> Result<ProviderUser, ProviderError>;
}

/// Resolver answer. Not-found is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Identity),
    NotFound,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{source_name} lookup failed: {message}")]
    Failed {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name} lookup timed out")]
    Timeout { source_name: &'static str },
}

/// One identity source in the refresh fallback chain.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    async fn resolve(&self, id: &str) -> Result<Lookup, IdentityError>;
}

/// Resolves against the external identity provider.
pub struct ProviderResolver {
    provider: Arc<dyn IdentityProvider>,
}

impl ProviderResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl IdentityResolver for ProviderResolver {
    fn name(&self) -> &'static str {
        "identity-provider"
    }

    async fn resolve(&self, id: &str) -> Result<Lookup, IdentityError> {
        match self.provider.get_user(id).await {
            Ok(user) => Ok(Lookup::Found(Identity {
                id: user.uid,
                email: user.email,
            })),
            Err(ProviderError::NotFound) => Ok(Lookup::NotFound),
            Err(e) => Err(IdentityError::Failed {
                source_name: self.name(),
                message: e.to_string(),
            }),
        }
    }
}

/// Resolves against the learning-platform user directory.
pub struct LearningPlatformResolver {
    directory: Arc<dyn LearningPlatformDirectory>,
}

impl LearningPlatformResolver {
    pub fn new(directory: Arc<dyn LearningPlatformDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl IdentityResolver for LearningPlatformResolver {
    fn name(&self) -> &'static str {
        "learning-platform"
    }

    async fn resolve(&self, id: &str) -> Result<Lookup, IdentityError> {
        match self.directory.find_one(id).await {
            Ok(Some(identity)) => Ok(Lookup::Found(identity)),
            Ok(None) => Ok(Lookup::NotFound),
            Err(e) => Err(IdentityError::Failed {
                source_name: self.name(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryIdentityProvider;
    use super::*;
    use crate::models::auth::LearningPlatformAccount;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn provider_resolver_maps_not_found_to_sentinel() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        provider.put_user("u1", "a@b.com");
        let resolver = ProviderResolver::new(provider);

        assert_eq!(
            resolver.resolve("u1").await.unwrap(),
            Lookup::Found(Identity {
                id: "u1".into(),
                email: "a@b.com".into()
            })
        );
        assert_eq!(resolver.resolve("u2").await.unwrap(), Lookup::NotFound);
    }

    #[tokio::test]
    async fn provider_resolver_surfaces_other_failures() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        provider.fail_with("quota exceeded");
        let err = ProviderResolver::new(provider)
            .resolve("u1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IdentityError::Failed {
                source_name: "identity-provider",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn learning_platform_resolver() {
        let store = Arc::new(MemoryStore::new());
        store.put_learning_user(LearningPlatformAccount::new("m1", "m1", "m@lms.org"));
        let resolver = LearningPlatformResolver::new(store);

        assert!(matches!(
            resolver.resolve("m1").await.unwrap(),
            Lookup::Found(Identity { ref email, .. }) if email == "m@lms.org"
        ));
        assert_eq!(resolver.resolve("m2").await.unwrap(), Lookup::NotFound);
    }
}
