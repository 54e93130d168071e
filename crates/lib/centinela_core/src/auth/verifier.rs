//! Bearer token verification.
//!
//! A token is checked against an ordered list of strategies, one per signing
//! secret. The first strategy whose signature matches wins and the result is
//! tagged with its [`TokenKind`]. After the signature the verifier checks the
//! user record, the user's live roles and the whitelist ledger, failing with a
//! distinct [`AuthError`] at each step.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::signer::{DecodeFailure, decode_claims};
use super::whitelist::WhitelistLedger;
use super::{AuthError, token_fingerprint};
use crate::config::AuthConfig;
use crate::models::auth::{SubjectClaim, TokenClaims};
use crate::store::{RoleStore, UserStore};

/// Which secret a token was signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// One secret to try.
#[derive(Clone)]
pub struct VerificationStrategy {
    kind: TokenKind,
    secret: String,
}

impl VerificationStrategy {
    pub fn new(kind: TokenKind, secret: impl Into<String>) -> Self {
        Self {
            kind,
            secret: secret.into(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }
}

/// A token that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Claim id and email from the token; roles are the user's live roles.
    pub claim: SubjectClaim,
    pub kind: TokenKind,
}

#[derive(Clone)]
pub struct TokenVerifier {
    strategies: Vec<VerificationStrategy>,
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    ledger: WhitelistLedger,
}

impl TokenVerifier {
    /// Accepts either token class: access secret first, then refresh secret.
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        ledger: WhitelistLedger,
    ) -> Self {
        Self::with_strategies(
            vec![
                VerificationStrategy::new(TokenKind::Access, config.access_secret.clone()),
                VerificationStrategy::new(TokenKind::Refresh, config.refresh_secret.clone()),
            ],
            users,
            roles,
            ledger,
        )
    }

    pub fn with_strategies(
        strategies: Vec<VerificationStrategy>,
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        ledger: WhitelistLedger,
    ) -> Self {
        Self {
            strategies,
            users,
            roles,
            ledger,
        }
    }

    /// The same verifier restricted to the access secret.
    pub fn access_only(&self) -> Self {
        Self {
            strategies: self
                .strategies
                .iter()
                .filter(|s| s.kind == TokenKind::Access)
                .cloned()
                .collect(),
            users: Arc::clone(&self.users),
            roles: Arc::clone(&self.roles),
            ledger: self.ledger.clone(),
        }
    }

    pub fn strategies(&self) -> impl Iterator<Item = TokenKind> + '_ {
        self.strategies.iter().map(|s| s.kind)
    }

    /// Run every check against `bearer` and return the live subject claim.
    pub async fn verify(&self, bearer: Option<&str>) -> Result<VerifiedToken, AuthError> {
        let token = bearer
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredentials)?;

        let (claims, kind) = self.match_signature(token)?;
        let fingerprint = token_fingerprint(token);

        let user = self
            .users
            .find_user(&claims.sub.id)
            .await?
            .ok_or_else(|| {
                debug!(token = %fingerprint, user_id = %claims.sub.id, "user not found");
                AuthError::UserNotFound
            })?;
        if user.is_deleted() {
            debug!(token = %fingerprint, user_id = %user.id, "user is deleted");
            return Err(AuthError::UserDeleted);
        }

        let live_roles = self.live_roles(&user.roles).await?;
        if live_roles.is_empty() {
            debug!(token = %fingerprint, user_id = %user.id, "no live roles");
            return Err(AuthError::InvalidRole);
        }

        if !self.ledger.is_active(token).await? {
            debug!(token = %fingerprint, "token not active in whitelist");
            return Err(AuthError::RevokedToken);
        }

        Ok(VerifiedToken {
            claim: SubjectClaim {
                id: claims.sub.id,
                email: claims.sub.email,
                roles: live_roles,
            },
            kind,
        })
    }

    /// Try each strategy in order. A valid signature with a bad payload stops
    /// the search; expired or foreign signatures fall through.
    fn match_signature(&self, token: &str) -> Result<(TokenClaims, TokenKind), AuthError> {
        for strategy in &self.strategies {
            match decode_claims(token, strategy.secret.as_bytes()) {
                Ok(claims) => return Ok((claims, strategy.kind)),
                Err(DecodeFailure::Malformed(reason)) => {
                    return Err(AuthError::MalformedToken(reason));
                }
                Err(DecodeFailure::Expired | DecodeFailure::Invalid) => continue,
            }
        }
        Err(AuthError::InvalidToken)
    }

    /// The user's roles that still exist in the role store, in user order.
    async fn live_roles(&self, codes: &[String]) -> Result<Vec<String>, AuthError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let existing: HashSet<String> = self
            .roles
            .find_roles_by_codes(codes)
            .await?
            .into_iter()
            .map(|r| r.code)
            .collect();
        Ok(codes
            .iter()
            .filter(|c| existing.contains(*c))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::auth::issuer::TokenIssuer;
    use crate::auth::signer::{SignOptions, sign};
    use crate::models::auth::User;
    use crate::models::role::{NewRole, Role};
    use crate::store::memory::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        issuer: TokenIssuer,
        verifier: TokenVerifier,
        ledger: WhitelistLedger,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let config = Arc::new(AuthConfig::new("access-secret", "refresh-secret").unwrap());
        let ledger = WhitelistLedger::new(store.clone());
        let issuer = TokenIssuer::new(config.clone(), ledger.clone()).unwrap();
        let verifier = TokenVerifier::new(&config, store.clone(), store.clone(), ledger.clone());

        store
            .insert_role(Role::from_new(NewRole::new("User", "USER")))
            .await
            .unwrap();
        store.put_user(user("u1", vec!["USER", "GHOST"]));

        Fixture {
            store,
            issuer,
            verifier,
            ledger,
        }
    }

    fn user(id: &str, roles: Vec<&str>) -> User {
        User {
            id: id.into(),
            email: "a@b.com".into(),
            roles: roles.into_iter().map(String::from).collect(),
            deleted_at: None,
        }
    }

    fn claim(id: &str) -> SubjectClaim {
        SubjectClaim::new(id, "a@b.com", vec!["USER".into()])
    }

    #[tokio::test]
    async fn missing_token() {
        let f = fixture().await;
        assert!(matches!(
            f.verifier.verify(None).await,
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            f.verifier.verify(Some("  ")).await,
            Err(AuthError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn access_token_verifies_with_live_roles() {
        let f = fixture().await;
        let pair = f.issuer.issue(&claim("u1")).await.unwrap();

        let verified = f.verifier.verify(Some(&pair.access_token)).await.unwrap();
        assert_eq!(verified.kind, TokenKind::Access);
        assert_eq!(verified.claim.id, "u1");
        assert_eq!(verified.claim.roles, vec!["USER".to_string()]);
    }

    #[tokio::test]
    async fn refresh_token_passes_dual_path_but_not_access_only() {
        let f = fixture().await;
        let pair = f.issuer.issue(&claim("u1")).await.unwrap();

        let verified = f.verifier.verify(Some(&pair.refresh_token)).await.unwrap();
        assert_eq!(verified.kind, TokenKind::Refresh);

        let access_only = f.verifier.access_only();
        assert_eq!(access_only.strategies().collect::<Vec<_>>(), vec![TokenKind::Access]);
        assert!(matches!(
            access_only.verify(Some(&pair.refresh_token)).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn foreign_signature_is_invalid() {
        let f = fixture().await;
        let token = sign(
            &claim("u1"),
            b"someone-else",
            SignOptions::expires_in(Duration::minutes(5)),
        )
        .unwrap();
        assert!(matches!(
            f.verifier.verify(Some(&token)).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn expired_token_is_invalid() {
        let f = fixture().await;
        let token = sign(
            &claim("u1"),
            b"access-secret",
            SignOptions::expires_in(Duration::hours(-2)),
        )
        .unwrap();
        f.ledger.register(&token).await.unwrap();
        assert!(matches!(
            f.verifier.verify(Some(&token)).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn bad_claim_shape_is_malformed() {
        let f = fixture().await;
        let payload = serde_json::json!({
            "sub": "u1",
            "iat": Utc::now().timestamp(),
            "exp": (Utc::now() + Duration::minutes(5)).timestamp(),
        });
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &payload,
            &jsonwebtoken::EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();
        assert!(matches!(
            f.verifier.verify(Some(&token)).await,
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn unknown_user() {
        let f = fixture().await;
        let pair = f.issuer.issue(&claim("nobody")).await.unwrap();
        assert!(matches!(
            f.verifier.verify(Some(&pair.access_token)).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn deleted_user() {
        let f = fixture().await;
        let mut deleted = user("u2", vec!["USER"]);
        deleted.deleted_at = Some(Utc::now());
        f.store.put_user(deleted);

        let pair = f.issuer.issue(&claim("u2")).await.unwrap();
        assert!(matches!(
            f.verifier.verify(Some(&pair.access_token)).await,
            Err(AuthError::UserDeleted)
        ));
    }

    #[tokio::test]
    async fn user_without_existing_roles() {
        let f = fixture().await;
        f.store.put_user(user("u3", vec!["GHOST"]));

        let pair = f.issuer.issue(&claim("u3")).await.unwrap();
        assert!(matches!(
            f.verifier.verify(Some(&pair.access_token)).await,
            Err(AuthError::InvalidRole)
        ));
    }

    #[tokio::test]
    async fn revoked_token() {
        let f = fixture().await;
        let pair = f.issuer.issue(&claim("u1")).await.unwrap();
        f.ledger.revoke(&pair.access_token).await.unwrap();
        assert!(matches!(
            f.verifier.verify(Some(&pair.access_token)).await,
            Err(AuthError::RevokedToken)
        ));
    }

    #[tokio::test]
    async fn never_whitelisted_token_is_revoked() {
        let f = fixture().await;
        let token = sign(
            &claim("u1"),
            b"access-secret",
            SignOptions::expires_in(Duration::minutes(5)),
        )
        .unwrap();
        assert!(matches!(
            f.verifier.verify(Some(&token)).await,
            Err(AuthError::RevokedToken)
        ));
    }
}
