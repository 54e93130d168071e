//! Login, logout and token validation.

use std::sync::Arc;

use tracing::{debug, info};

use super::issuer::TokenIssuer;
use super::verifier::{TokenVerifier, VerifiedToken};
use super::whitelist::WhitelistLedger;
use super::AuthError;
use crate::identity::{IdentityProvider, ProviderError};
use crate::models::auth::{SubjectClaim, TokenPair};
use crate::store::{LearningPlatformDirectory, UserStore};

#[derive(Clone)]
pub struct SessionService {
    provider: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserStore>,
    learning_platform: Arc<dyn LearningPlatformDirectory>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    ledger: WhitelistLedger,
}

impl SessionService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserStore>,
        learning_platform: Arc<dyn LearningPlatformDirectory>,
        issuer: TokenIssuer,
        verifier: TokenVerifier,
        ledger: WhitelistLedger,
    ) -> Self {
        Self {
            provider,
            users,
            learning_platform,
            issuer,
            verifier,
            ledger,
        }
    }

    /// Exchange a provider-issued token for a token pair.
    ///
    /// The provider vouches for the caller; the local user record (matched by
    /// email) supplies the id and roles that go into the claim.
    pub async fn login(&self, provider_token: &str) -> Result<TokenPair, AuthError> {
        if provider_token.trim().is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let provider_user = self
            .provider
            .verify_token(provider_token)
            .await
            .map_err(provider_failure)?;
        let provider_user = self
            .provider
            .get_user(&provider_user.uid)
            .await
            .map_err(provider_failure)?;

        let user = self
            .users
            .find_user_by_email(&provider_user.email)
            .await?
            .ok_or_else(|| {
                debug!(uid = %provider_user.uid, "no local user for provider account");
                AuthError::UserNotFound
            })?;
        if user.is_deleted() {
            return Err(AuthError::UserDeleted);
        }

        let pair = self
            .issuer
            .issue(&SubjectClaim::new(user.id.clone(), user.email, user.roles))
            .await?;
        info!(user_id = %user.id, "user logged in");
        Ok(pair)
    }

    /// Log in a learning-platform account by username and email.
    ///
    /// The account must exist in the mirrored directory, its email must match
    /// and it must be confirmed and not suspended. Its own roles go into the
    /// claim.
    pub async fn login_learning_platform(
        &self,
        username: &str,
        email: &str,
    ) -> Result<TokenPair, AuthError> {
        let (username, email) = (username.trim(), email.trim());
        if username.is_empty() || email.is_empty() {
            return Err(AuthError::Validation(
                "Username and email are required".into(),
            ));
        }

        let account = self
            .learning_platform
            .find_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if account.email != email {
            debug!(user_id = %account.id, "learning-platform email mismatch");
            return Err(AuthError::Validation(
                "Username and email do not match".into(),
            ));
        }
        if account.suspended {
            return Err(AuthError::AccountSuspended);
        }
        if !account.confirmed {
            return Err(AuthError::AccountUnconfirmed);
        }

        let pair = self
            .issuer
            .issue(&SubjectClaim::new(
                account.id.clone(),
                account.email,
                account.roles,
            ))
            .await?;
        info!(user_id = %account.id, "learning-platform user logged in");
        Ok(pair)
    }

    /// Revoke `token` in the ledger.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        self.ledger.revoke(token).await
    }

    /// Accepts either token class.
    pub async fn validate_token(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        self.verifier.verify(Some(token)).await
    }
}

fn provider_failure(e: ProviderError) -> AuthError {
    match e {
        ProviderError::NotFound => AuthError::IdentityNotFound,
        ProviderError::InvalidToken(_) => AuthError::InvalidToken,
        ProviderError::Other(message) => AuthError::IdentityUnavailable(message),
    }
}
