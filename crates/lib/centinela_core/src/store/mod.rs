//! Document-store abstraction.
//!
//! Every collection the core touches is reached through one of these traits.
//! Two backends are provided: [`memory::MemoryStore`] for tests and local
//! development, and [`postgres::PgStore`] for deployments.
//!
//! Read-modify-write sequences (ledger revocation, API key usage metering,
//! OTP rate limiting and redemption, role restriction toggling) are expressed as single conditional operations
//! so that each backend can make them atomic.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::api_key::{ApiKeyRecord, ApiKeyUpdate};
use crate::models::auth::{Identity, LearningPlatformAccount, User, WhitelistEntry};
use crate::models::otp::OtpCode;
use crate::models::role::Role;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an ACTIVE → IDLE compare-and-set on a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    AlreadyIdle,
    Missing,
}

/// Outcome of a conditional usage increment on an API key.
#[derive(Debug, Clone)]
pub enum UsageOutcome {
    /// Counter incremented; carries the updated record.
    Recorded(ApiKeyRecord),
    /// The key is active but has reached `max_usage`.
    LimitReached,
    /// The key is inactive or gone.
    Inactive,
}

#[async_trait]
pub trait WhitelistStore: Send + Sync {
    /// Insert a new entry. Fails with `Conflict` if the token already exists.
    async fn insert_entry(&self, entry: WhitelistEntry) -> StoreResult<()>;

    async fn find_entry(&self, token: &str) -> StoreResult<Option<WhitelistEntry>>;

    /// Flip an ACTIVE entry to IDLE, stamping `updated_at`/`updated_by`.
    async fn deactivate_entry(
        &self,
        token: &str,
        at: DateTime<Utc>,
        by: Option<&str>,
    ) -> StoreResult<RevokeOutcome>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn list_roles(&self) -> StoreResult<Vec<Role>>;

    async fn get_role(&self, id: &str) -> StoreResult<Option<Role>>;

    /// Roles whose `code` is in `codes`, in no particular order.
    async fn find_roles_by_codes(&self, codes: &[String]) -> StoreResult<Vec<Role>>;

    /// Insert a role. Fails with `Conflict` on a duplicate `code`.
    async fn insert_role(&self, role: Role) -> StoreResult<Role>;

    /// Replace a role by id. Returns `None` if it does not exist.
    async fn replace_role(&self, role: Role) -> StoreResult<Option<Role>>;

    /// Atomically negate `restricted`. Returns `None` if the role does not exist.
    async fn toggle_role_restriction(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Role>>;

    /// Delete a role. Returns whether it existed.
    async fn delete_role(&self, id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
}

/// Secondary identity source (learning platform users).
#[async_trait]
pub trait LearningPlatformDirectory: Send + Sync {
    async fn find_one(&self, id: &str) -> StoreResult<Option<Identity>>;

    async fn find_by_username(
        &self,
        username: &str,
    ) -> StoreResult<Option<LearningPlatformAccount>>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn insert_key(&self, record: ApiKeyRecord) -> StoreResult<ApiKeyRecord>;

    async fn get_key(&self, id: &str) -> StoreResult<Option<ApiKeyRecord>>;

    /// Active keys, oldest first. `limit = None` returns all of them.
    async fn list_active_keys(
        &self,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ApiKeyRecord>>;

    async fn update_key(&self, id: &str, patch: &ApiKeyUpdate)
    -> StoreResult<Option<ApiKeyRecord>>;

    /// Set `is_active = false`. Returns whether the key exists.
    async fn deactivate_key(&self, id: &str) -> StoreResult<bool>;

    /// Increment `usage_count` and stamp `last_used_at`, only if the key is
    /// active and below its cap.
    async fn record_key_usage(&self, id: &str, at: DateTime<Utc>) -> StoreResult<UsageOutcome>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Insert `otp` unless its user already has `limit` codes created at or
    /// after `since`. Returns `false` when the limit is reached. The count and
    /// the insert are atomic per user.
    async fn insert_otp_within_limit(
        &self,
        otp: OtpCode,
        since: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<bool>;

    /// The user's most recently created code.
    async fn latest_otp(&self, user_id: &str) -> StoreResult<Option<OtpCode>>;

    /// Flip a NOT_USED code to USED. Returns `false` if it was already used
    /// or does not exist.
    async fn mark_otp_used(&self, user_id: &str, id: &str) -> StoreResult<bool>;
}
