//! API key management and validation.
//!
//! Keys are opaque random strings. Only a bcrypt hash is stored; the
//! plaintext is handed back once, at creation. Validation scans active keys,
//! and a match is metered through the store's conditional usage increment so
//! that a capped key can never be used past its limit.

pub mod hash;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use self::hash::{BCRYPT_COST, generate_key, hash_key, verify_key};
use crate::auth::AuthError;
use crate::models::api_key::{ApiKeyRecord, ApiKeyUpdate, CreatedApiKey, NewApiKey};
use crate::store::{ApiKeyStore, UsageOutcome};
use crate::uuid::{parse_id, uuidv7};

/// Default page size for [`ApiKeyService::list_active`].
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn ApiKeyStore>,
    hash_cost: u32,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self {
            store,
            hash_cost: BCRYPT_COST,
        }
    }

    /// Override the bcrypt cost used for new keys.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Create a key. The returned plaintext is not recoverable afterwards.
    pub async fn create(&self, new: NewApiKey) -> Result<CreatedApiKey, AuthError> {
        if new.system_name.trim().is_empty() {
            return Err(AuthError::Validation("system_name is required".into()));
        }
        if matches!(new.max_usage, Some(max) if max < 0) {
            return Err(AuthError::Validation("maxUsage must not be negative".into()));
        }

        let key = generate_key();
        let record = ApiKeyRecord {
            id: uuidv7().to_string(),
            key_hash: hash_key(&key, self.hash_cost)?,
            system_name: new.system_name,
            description: new.description,
            roles: new.roles,
            max_usage: new.max_usage,
            usage_count: 0,
            allowed_ips: new.allowed_ips,
            permissions: new.permissions,
            expiration: new.expiration,
            is_active: true,
            last_used_at: None,
            created_at: Utc::now(),
        };
        let record = self.store.insert_key(record).await?;
        info!(key_id = %record.id, system = %record.system_name, "api key created");

        Ok(CreatedApiKey {
            key,
            is_active: record.is_active,
            record,
        })
    }

    pub async fn get(&self, id: &str) -> Result<ApiKeyRecord, AuthError> {
        check_id(id)?;
        self.store
            .get_key(id)
            .await?
            .ok_or_else(|| AuthError::NotFound("API key not found".into()))
    }

    pub async fn update(&self, id: &str, patch: ApiKeyUpdate) -> Result<ApiKeyRecord, AuthError> {
        check_id(id)?;
        if matches!(patch.max_usage, Some(Some(max)) if max < 0) {
            return Err(AuthError::Validation("maxUsage must not be negative".into()));
        }
        self.store
            .update_key(id, &patch)
            .await?
            .ok_or_else(|| AuthError::NotFound("API key not found".into()))
    }

    /// Deactivate a key.
    pub async fn revoke(&self, id: &str) -> Result<(), AuthError> {
        check_id(id)?;
        if !self.store.deactivate_key(id).await? {
            return Err(AuthError::NotFound("API key not found".into()));
        }
        info!(key_id = %id, "api key revoked");
        Ok(())
    }

    /// Active keys, one page at a time. `page` starts at 1.
    pub async fn list_active(&self, page: usize, limit: usize) -> Result<Vec<ApiKeyRecord>, AuthError> {
        if page == 0 || limit == 0 {
            return Err(AuthError::Validation(
                "page and limit must be positive".into(),
            ));
        }
        Ok(self
            .store
            .list_active_keys((page - 1) * limit, Some(limit))
            .await?)
    }

    /// Check a presented key and meter its use.
    ///
    /// Returns `Ok(false)` for unknown, inactive or expired keys. A matching
    /// key at its cap is deactivated and rejected with
    /// [`AuthError::UsageLimitExceeded`]. Store failures are reported as
    /// [`AuthError::KeyValidation`].
    pub async fn validate(&self, presented: &str) -> Result<bool, AuthError> {
        if presented.is_empty() {
            return Ok(false);
        }
        let now = Utc::now();
        let candidates = self
            .store
            .list_active_keys(0, None)
            .await
            .map_err(AuthError::KeyValidation)?;

        let Some(record) = candidates
            .into_iter()
            .filter(|r| !r.is_expired(now))
            .find(|r| verify_key(presented, &r.key_hash))
        else {
            debug!("api key did not match any active key");
            return Ok(false);
        };

        if record.is_capped() {
            return self.exhaust(&record).await;
        }

        match self
            .store
            .record_key_usage(&record.id, now)
            .await
            .map_err(AuthError::KeyValidation)?
        {
            UsageOutcome::Recorded(updated) => {
                debug!(key_id = %updated.id, usage = updated.usage_count, "api key accepted");
                Ok(true)
            }
            UsageOutcome::LimitReached => self.exhaust(&record).await,
            UsageOutcome::Inactive => {
                debug!(key_id = %record.id, "api key deactivated concurrently");
                Ok(false)
            }
        }
    }

    async fn exhaust(&self, record: &ApiKeyRecord) -> Result<bool, AuthError> {
        self.store
            .deactivate_key(&record.id)
            .await
            .map_err(AuthError::KeyValidation)?;
        warn!(key_id = %record.id, system = %record.system_name, "api key usage limit reached, deactivated");
        Err(AuthError::UsageLimitExceeded)
    }
}

fn check_id(id: &str) -> Result<(), AuthError> {
    parse_id(id)
        .map(|_| ())
        .ok_or_else(|| AuthError::Validation("Invalid id".into()))
}
