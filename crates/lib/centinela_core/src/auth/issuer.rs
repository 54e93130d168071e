//! Token pair issuance.

use std::sync::Arc;

use tracing::{info, warn};

use super::signer::{SignOptions, sign};
use super::whitelist::WhitelistLedger;
use super::AuthError;
use crate::config::{AuthConfig, ConfigError};
use crate::models::auth::{SubjectClaim, TokenPair};

/// Mints access + refresh pairs and registers them in the ledger.
///
/// Both tokens carry the same subject claim but are signed with different
/// secrets and expiries, so a refresh token never passes an access-only check.
#[derive(Clone)]
pub struct TokenIssuer {
    config: Arc<AuthConfig>,
    ledger: WhitelistLedger,
}

impl TokenIssuer {
    /// Fails with a configuration error if either secret is missing.
    pub fn new(config: Arc<AuthConfig>, ledger: WhitelistLedger) -> Result<Self, ConfigError> {
        config.check_secrets()?;
        Ok(Self { config, ledger })
    }

    /// Issue a new pair for `subject`.
    ///
    /// The pair is only returned once both tokens are whitelisted; a ledger
    /// failure fails the issuance and leaves no ACTIVE entry behind.
    pub async fn issue(&self, subject: &SubjectClaim) -> Result<TokenPair, AuthError> {
        let access_token = sign(
            subject,
            self.config.access_secret.as_bytes(),
            SignOptions::expires_in(self.config.access_expiry),
        )?;
        let refresh_token = sign(
            subject,
            self.config.refresh_secret.as_bytes(),
            SignOptions::expires_in(self.config.refresh_expiry),
        )?;

        self.ledger
            .register_as(&access_token, Some(&subject.id))
            .await?;
        if let Err(e) = self
            .ledger
            .register_as(&refresh_token, Some(&subject.id))
            .await
        {
            // The access token must not outlive a failed issuance.
            if let Err(cleanup) = self
                .ledger
                .revoke_as(&access_token, Some(&subject.id))
                .await
            {
                warn!(
                    user_id = %subject.id,
                    error = %cleanup,
                    "could not retire access token after failed issuance"
                );
            }
            return Err(e);
        }

        info!(user_id = %subject.id, "issued token pair");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::auth::signer::decode_claims;
    use crate::models::auth::{WhitelistEntry, WhitelistStatus};
    use crate::store::memory::MemoryStore;
    use crate::store::{RevokeOutcome, StoreError, StoreResult, WhitelistStore};

    fn issuer() -> (TokenIssuer, WhitelistLedger) {
        let config = Arc::new(AuthConfig::new("access-secret", "refresh-secret").unwrap());
        let ledger = WhitelistLedger::new(Arc::new(MemoryStore::new()));
        (TokenIssuer::new(config, ledger.clone()).unwrap(), ledger)
    }

    #[test]
    fn missing_secret_is_configuration_error() {
        let mut config = AuthConfig::new("a", "r").unwrap();
        config.refresh_secret.clear();
        let ledger = WhitelistLedger::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            TokenIssuer::new(Arc::new(config), ledger),
            Err(ConfigError::Missing("JWT_REFRESH_SECRET"))
        ));
    }

    #[tokio::test]
    async fn pair_uses_distinct_secrets_and_expiries() {
        let (issuer, _) = issuer();
        let subject = SubjectClaim::new("u1", "a@b.com", vec!["USER".into()]);
        let pair = issuer.issue(&subject).await.unwrap();

        let access = decode_claims(&pair.access_token, b"access-secret").unwrap();
        let refresh = decode_claims(&pair.refresh_token, b"refresh-secret").unwrap();
        assert_eq!(access.sub, subject);
        assert_eq!(refresh.sub, subject);
        assert_eq!(access.exp - access.iat, 15 * 60);
        assert_eq!(refresh.exp - refresh.iat, 24 * 60 * 60);

        assert!(decode_claims(&pair.access_token, b"refresh-secret").is_err());
        assert!(decode_claims(&pair.refresh_token, b"access-secret").is_err());
    }

    #[tokio::test]
    async fn issued_tokens_are_whitelisted() {
        let (issuer, ledger) = issuer();
        let pair = issuer
            .issue(&SubjectClaim::new("u1", "a@b.com", vec![]))
            .await
            .unwrap();
        assert!(ledger.is_active(&pair.access_token).await.unwrap());
        assert!(ledger.is_active(&pair.refresh_token).await.unwrap());
    }

    /// Accepts the first insert, rejects the rest.
    #[derive(Default)]
    struct SecondInsertFails {
        inner: MemoryStore,
        inserted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WhitelistStore for SecondInsertFails {
        async fn insert_entry(&self, entry: WhitelistEntry) -> StoreResult<()> {
            {
                let mut inserted = self.inserted.lock().unwrap();
                if !inserted.is_empty() {
                    return Err(StoreError::Backend("ledger unavailable".into()));
                }
                inserted.push(entry.token.clone());
            }
            self.inner.insert_entry(entry).await
        }

        async fn find_entry(&self, token: &str) -> StoreResult<Option<WhitelistEntry>> {
            self.inner.find_entry(token).await
        }

        async fn deactivate_entry(
            &self,
            token: &str,
            at: DateTime<Utc>,
            by: Option<&str>,
        ) -> StoreResult<RevokeOutcome> {
            self.inner.deactivate_entry(token, at, by).await
        }
    }

    #[tokio::test]
    async fn failed_refresh_registration_retires_access_token() {
        let store = Arc::new(SecondInsertFails::default());
        let config = Arc::new(AuthConfig::new("access-secret", "refresh-secret").unwrap());
        let issuer = TokenIssuer::new(config, WhitelistLedger::new(store.clone())).unwrap();

        let err = issuer
            .issue(&SubjectClaim::new("u1", "a@b.com", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));

        let inserted = store.inserted.lock().unwrap().clone();
        assert_eq!(inserted.len(), 1);
        let entry = store.find_entry(&inserted[0]).await.unwrap().unwrap();
        assert_eq!(entry.status, WhitelistStatus::Idle);
        assert_eq!(entry.updated_by.as_deref(), Some("u1"));
    }
}
