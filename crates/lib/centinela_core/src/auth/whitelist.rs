//! Whitelist ledger.
//!
//! A token is usable only while its ledger entry exists with status ACTIVE,
//! independent of its cryptographic expiry. Logout flips the entry to IDLE;
//! entries are never deleted by normal flow.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::{AuthError, token_fingerprint};
use crate::models::auth::WhitelistEntry;
use crate::store::{RevokeOutcome, StoreError, WhitelistStore};

#[derive(Clone)]
pub struct WhitelistLedger {
    store: Arc<dyn WhitelistStore>,
}

impl WhitelistLedger {
    pub fn new(store: Arc<dyn WhitelistStore>) -> Self {
        Self { store }
    }

    /// Insert a new ACTIVE entry.
    pub async fn register(&self, token: &str) -> Result<(), AuthError> {
        self.register_as(token, None).await
    }

    /// Insert a new ACTIVE entry, recording who it was issued for.
    pub async fn register_as(&self, token: &str, created_by: Option<&str>) -> Result<(), AuthError> {
        self.store
            .insert_entry(WhitelistEntry::active(token, created_by.map(str::to_string)))
            .await?;
        debug!(token = %token_fingerprint(token), "token whitelisted");
        Ok(())
    }

    /// Flip an ACTIVE entry to IDLE.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        self.revoke_as(token, None).await
    }

    /// Flip an ACTIVE entry to IDLE, recording who revoked it.
    pub async fn revoke_as(&self, token: &str, revoked_by: Option<&str>) -> Result<(), AuthError> {
        match self
            .store
            .deactivate_entry(token, Utc::now(), revoked_by)
            .await?
        {
            RevokeOutcome::Revoked => {
                info!(token = %token_fingerprint(token), "token revoked");
                Ok(())
            }
            RevokeOutcome::AlreadyIdle => Err(AuthError::AlreadyRevoked),
            RevokeOutcome::Missing => Err(AuthError::NotFound("Token not found".into())),
        }
    }

    /// True only for an existing ACTIVE entry. Unknown tokens are not an error.
    pub async fn is_active(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self
            .store
            .find_entry(token)
            .await?
            .is_some_and(|entry| entry.is_active()))
    }

    /// Look up the raw entry.
    pub async fn entry(&self, token: &str) -> Result<Option<WhitelistEntry>, StoreError> {
        self.store.find_entry(token).await
    }
}
