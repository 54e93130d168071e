//! In-memory identity provider for tests and local development.

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{IdentityProvider, ProviderError, ProviderUser};

#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    users: DashMap<String, ProviderUser>,
    /// provider token → uid
    tokens: DashMap<String, String>,
    failure: Mutex<Option<String>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_user(&self, uid: &str, email: &str) {
        self.users.insert(
            uid.to_string(),
            ProviderUser {
                uid: uid.to_string(),
                email: email.to_string(),
            },
        );
    }

    /// Make `token` verify as `uid`.
    pub fn put_token(&self, token: &str, uid: &str) {
        self.tokens.insert(token.to_string(), uid.to_string());
    }

    /// Fail every subsequent call with `ProviderError::Other`.
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.to_string());
        }
    }

    fn check_failure(&self) -> Result<(), ProviderError> {
        match self.failure.lock() {
            Ok(failure) => match failure.as_deref() {
                Some(message) => Err(ProviderError::Other(message.to_string())),
                None => Ok(()),
            },
            Err(_) => Err(ProviderError::Other("provider state poisoned".into())),
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn verify_token(&self, raw_token: &str) -> Result<ProviderUser, ProviderError> {
        self.check_failure()?;
        let uid = self
            .tokens
            .get(raw_token)
            .map(|uid| uid.clone())
            .ok_or_else(|| ProviderError::InvalidToken("unknown token".into()))?;
        self.get_user(&uid).await
    }

    async fn get_user(&self, uid: &str) -> Result<ProviderUser, ProviderError> {
        self.check_failure()?;
        self.users
            .get(uid)
            .map(|u| u.clone())
            .ok_or(ProviderError::NotFound)
    }
}
