//! Refresh token rotation.
//!
//! A refresh token is exchanged for a new pair at most once. The subject is
//! re-resolved against the identity sources in priority order; the first
//! source that knows the id supplies the new id and email, while roles are
//! carried forward from the presented refresh claim.

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, info};

use super::issuer::TokenIssuer;
use super::signer::{DecodeFailure, decode_claims};
use super::whitelist::WhitelistLedger;
use super::{AuthError, token_fingerprint};
use crate::config::AuthConfig;
use crate::identity::{IdentityError, IdentityResolver, Lookup};
use crate::models::auth::{Identity, SubjectClaim, TokenPair};

#[derive(Clone)]
pub struct RefreshCoordinator {
    config: Arc<AuthConfig>,
    resolvers: Vec<Arc<dyn IdentityResolver>>,
    issuer: TokenIssuer,
    ledger: WhitelistLedger,
}

impl RefreshCoordinator {
    /// `resolvers` are tried in order until one finds the subject.
    pub fn new(
        config: Arc<AuthConfig>,
        resolvers: Vec<Arc<dyn IdentityResolver>>,
        issuer: TokenIssuer,
        ledger: WhitelistLedger,
    ) -> Self {
        Self {
            config,
            resolvers,
            issuer,
            ledger,
        }
    }

    /// Exchange `refresh_token` for a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let token = refresh_token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let fingerprint = token_fingerprint(token);

        let claims = decode_claims(token, self.config.refresh_secret.as_bytes()).map_err(|e| {
            debug!(token = %fingerprint, failure = ?e, "refresh token rejected");
            match e {
                DecodeFailure::Expired => AuthError::ExpiredRefreshToken,
                DecodeFailure::Invalid | DecodeFailure::Malformed(_) => {
                    AuthError::InvalidRefreshToken
                }
            }
        })?;

        if !self.ledger.is_active(token).await? {
            debug!(token = %fingerprint, "refresh token not active");
            return Err(AuthError::RevokedToken);
        }

        let identity = self.resolve_identity(&claims.sub.id).await?;

        // Consume the presented token before minting, so two concurrent
        // refreshes with the same token cannot both succeed.
        match self.ledger.revoke_as(token, Some(&identity.id)).await {
            Ok(()) => {}
            Err(AuthError::AlreadyRevoked | AuthError::NotFound(_)) => {
                return Err(AuthError::RevokedToken);
            }
            Err(e) => return Err(e),
        }

        let subject = SubjectClaim {
            id: identity.id,
            email: identity.email,
            roles: claims.sub.roles,
        };
        let pair = self.issuer.issue(&subject).await?;
        info!(token = %fingerprint, user_id = %subject.id, "refresh token rotated");
        Ok(pair)
    }

    async fn resolve_identity(&self, id: &str) -> Result<Identity, AuthError> {
        for resolver in &self.resolvers {
            let outcome = match timeout(self.config.identity_timeout, resolver.resolve(id)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(IdentityError::Timeout {
                    source_name: resolver.name(),
                }),
            };
            match outcome {
                Ok(Lookup::Found(identity)) => {
                    debug!(user_id = %id, source = resolver.name(), "identity resolved");
                    return Ok(identity);
                }
                Ok(Lookup::NotFound) => {
                    debug!(user_id = %id, source = resolver.name(), "identity not found, trying next source");
                }
                Err(e) => return Err(AuthError::IdentityUnavailable(e.to_string())),
            }
        }
        Err(AuthError::IdentityNotFound)
    }
}
