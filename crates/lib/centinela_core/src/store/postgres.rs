//! PostgreSQL store backend.
//!
//! Conditional updates are single `UPDATE … WHERE <guard>` statements, so the
//! ledger flip and the usage increment are atomic at the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{
    ApiKeyStore, LearningPlatformDirectory, OtpStore, RevokeOutcome, RoleStore, StoreError,
    StoreResult, UsageOutcome, UserStore, WhitelistStore,
};
use crate::models::api_key::{ApiKeyRecord, ApiKeyUpdate};
use crate::models::auth::{
    Identity, LearningPlatformAccount, User, WhitelistEntry, WhitelistStatus,
};
use crate::models::otp::{OtpCode, OtpStatus};
use crate::models::role::Role;

const ROLE_COLUMNS: &str = "id::text AS id, name, code, description, associated_platform, \
     x_api_key, restricted, created_at, updated_at";

const OTP_COLUMNS: &str =
    "id::text AS id, user_id, email, code_hash, status, created_at, expires_at";

const API_KEY_COLUMNS: &str = "id::text AS id, key_hash, system_name, description, roles, \
     max_usage, usage_count, allowed_ips, permissions, expiration, is_active, last_used_at, \
     created_at";

/// Store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map unique-constraint violations to `Conflict`.
fn conflict_or(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("{what} already exists"))
        }
        _ => StoreError::Db(e),
    }
}

#[derive(sqlx::FromRow)]
struct WhitelistRow {
    token: String,
    status: String,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<String>,
}

impl TryFrom<WhitelistRow> for WhitelistEntry {
    type Error = StoreError;

    fn try_from(row: WhitelistRow) -> Result<Self, Self::Error> {
        let status = WhitelistStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown ledger status: {}", row.status)))?;
        Ok(WhitelistEntry {
            token: row.token,
            status,
            created_at: row.created_at,
            created_by: row.created_by,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
            deleted_at: row.deleted_at,
            deleted_by: row.deleted_by,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: String,
    name: String,
    code: String,
    description: String,
    associated_platform: String,
    x_api_key: String,
    restricted: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id,
            name: row.name,
            code: row.code,
            description: row.description,
            associated_platform: row.associated_platform,
            x_api_key: row.x_api_key,
            restricted: row.restricted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: String,
    key_hash: String,
    system_name: String,
    description: Option<String>,
    roles: Vec<String>,
    max_usage: Option<i64>,
    usage_count: i64,
    allowed_ips: Vec<String>,
    permissions: Vec<String>,
    expiration: Option<DateTime<Utc>>,
    is_active: bool,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ApiKeyRow> for ApiKeyRecord {
    fn from(row: ApiKeyRow) -> Self {
        ApiKeyRecord {
            id: row.id,
            key_hash: row.key_hash,
            system_name: row.system_name,
            description: row.description,
            roles: row.roles,
            max_usage: row.max_usage,
            usage_count: row.usage_count,
            allowed_ips: row.allowed_ips,
            permissions: row.permissions,
            expiration: row.expiration,
            is_active: row.is_active,
            last_used_at: row.last_used_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl WhitelistStore for PgStore {
    async fn insert_entry(&self, entry: WhitelistEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO whitelist (token, status, created_at, created_by) VALUES ($1, $2, $3, $4)",
        )
        .bind(&entry.token)
        .bind(entry.status.as_str())
        .bind(entry.created_at)
        .bind(&entry.created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "token"))?;
        Ok(())
    }

    async fn find_entry(&self, token: &str) -> StoreResult<Option<WhitelistEntry>> {
        let row = sqlx::query_as::<_, WhitelistRow>(
            "SELECT token, status, created_at, created_by, updated_at, updated_by, \
             deleted_at, deleted_by FROM whitelist WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(WhitelistEntry::try_from).transpose()
    }

    async fn deactivate_entry(
        &self,
        token: &str,
        at: DateTime<Utc>,
        by: Option<&str>,
    ) -> StoreResult<RevokeOutcome> {
        let result = sqlx::query(
            "UPDATE whitelist SET status = 'IDLE', updated_at = $2, updated_by = $3 \
             WHERE token = $1 AND status = 'ACTIVE'",
        )
        .bind(token)
        .bind(at)
        .bind(by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(RevokeOutcome::Revoked);
        }

        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM whitelist WHERE token = $1)")
                .bind(token)
                .fetch_one(&self.pool)
                .await?;
        Ok(if exists {
            RevokeOutcome::AlreadyIdle
        } else {
            RevokeOutcome::Missing
        })
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn get_role(&self, id: &str) -> StoreResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1::uuid"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Role::from))
    }

    async fn find_roles_by_codes(&self, codes: &[String]) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE code = ANY($1)"
        ))
        .bind(codes)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn insert_role(&self, role: Role) -> StoreResult<Role> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "INSERT INTO roles (id, name, code, description, associated_platform, x_api_key, \
             restricted, created_at) VALUES ($1::uuid, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {ROLE_COLUMNS}"
        ))
        .bind(&role.id)
        .bind(&role.name)
        .bind(&role.code)
        .bind(&role.description)
        .bind(&role.associated_platform)
        .bind(&role.x_api_key)
        .bind(role.restricted)
        .bind(role.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "role code"))?;
        Ok(row.into())
    }

    async fn replace_role(&self, role: Role) -> StoreResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "UPDATE roles SET name = $2, code = $3, description = $4, associated_platform = $5, \
             x_api_key = $6, updated_at = $7 WHERE id = $1::uuid RETURNING {ROLE_COLUMNS}"
        ))
        .bind(&role.id)
        .bind(&role.name)
        .bind(&role.code)
        .bind(&role.description)
        .bind(&role.associated_platform)
        .bind(&role.x_api_key)
        .bind(role.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "role code"))?;
        Ok(row.map(Role::from))
    }

    async fn toggle_role_restriction(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "UPDATE roles SET restricted = NOT restricted, updated_at = $2 \
             WHERE id = $1::uuid RETURNING {ROLE_COLUMNS}"
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Role::from))
    }

    async fn delete_role(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1::uuid")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, (String, String, Vec<String>, Option<DateTime<Utc>>)>(
            "SELECT id, email, roles, deleted_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, email, roles, deleted_at)| User {
            id,
            email,
            roles,
            deleted_at,
        }))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, (String, String, Vec<String>, Option<DateTime<Utc>>)>(
            "SELECT id, email, roles, deleted_at FROM users WHERE email = $1 \
             ORDER BY deleted_at NULLS FIRST LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, email, roles, deleted_at)| User {
            id,
            email,
            roles,
            deleted_at,
        }))
    }
}

#[async_trait]
impl LearningPlatformDirectory for PgStore {
    async fn find_one(&self, id: &str) -> StoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT id, email FROM learning_platform_users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, email)| Identity { id, email }))
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> StoreResult<Option<LearningPlatformAccount>> {
        let row = sqlx::query_as::<_, LearningAccountRow>(
            "SELECT id, username, email, roles, confirmed, suspended \
             FROM learning_platform_users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(LearningPlatformAccount::from))
    }
}

#[derive(sqlx::FromRow)]
struct LearningAccountRow {
    id: String,
    username: String,
    email: String,
    roles: Vec<String>,
    confirmed: bool,
    suspended: bool,
}

impl From<LearningAccountRow> for LearningPlatformAccount {
    fn from(row: LearningAccountRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            roles: row.roles,
            confirmed: row.confirmed,
            suspended: row.suspended,
        }
    }
}

#[async_trait]
impl ApiKeyStore for PgStore {
    async fn insert_key(&self, record: ApiKeyRecord) -> StoreResult<ApiKeyRecord> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "INSERT INTO api_keys (id, key_hash, system_name, description, roles, max_usage, \
             usage_count, allowed_ips, permissions, expiration, is_active, created_at) \
             VALUES ($1::uuid, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {API_KEY_COLUMNS}"
        ))
        .bind(&record.id)
        .bind(&record.key_hash)
        .bind(&record.system_name)
        .bind(&record.description)
        .bind(&record.roles)
        .bind(record.max_usage)
        .bind(record.usage_count)
        .bind(&record.allowed_ips)
        .bind(&record.permissions)
        .bind(record.expiration)
        .bind(record.is_active)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "api key"))?;
        Ok(row.into())
    }

    async fn get_key(&self, id: &str) -> StoreResult<Option<ApiKeyRecord>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = $1::uuid"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ApiKeyRecord::from))
    }

    async fn list_active_keys(
        &self,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ApiKeyRecord>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE is_active \
             ORDER BY created_at, id OFFSET $1 LIMIT $2"
        ))
        .bind(offset as i64)
        .bind(limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ApiKeyRecord::from).collect())
    }

    async fn update_key(
        &self,
        id: &str,
        patch: &ApiKeyUpdate,
    ) -> StoreResult<Option<ApiKeyRecord>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "UPDATE api_keys SET \
               system_name = COALESCE($2, system_name), \
               description = COALESCE($3, description), \
               roles = COALESCE($4, roles), \
               max_usage = CASE WHEN $5 THEN $6 ELSE max_usage END, \
               allowed_ips = COALESCE($7, allowed_ips), \
               permissions = COALESCE($8, permissions), \
               expiration = CASE WHEN $9 THEN $10 ELSE expiration END, \
               is_active = COALESCE($11, is_active) \
             WHERE id = $1::uuid RETURNING {API_KEY_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.system_name)
        .bind(&patch.description)
        .bind(&patch.roles)
        .bind(patch.max_usage.is_some())
        .bind(patch.max_usage.flatten())
        .bind(&patch.allowed_ips)
        .bind(&patch.permissions)
        .bind(patch.expiration.is_some())
        .bind(patch.expiration.flatten())
        .bind(patch.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ApiKeyRecord::from))
    }

    async fn deactivate_key(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE api_keys SET is_active = false WHERE id = $1::uuid")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_key_usage(&self, id: &str, at: DateTime<Utc>) -> StoreResult<UsageOutcome> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "UPDATE api_keys SET usage_count = usage_count + 1, last_used_at = $2 \
             WHERE id = $1::uuid AND is_active \
               AND (max_usage IS NULL OR usage_count < max_usage) \
             RETURNING {API_KEY_COLUMNS}"
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(UsageOutcome::Recorded(row.into()));
        }

        // The guard rejected the update; find out why.
        let state = sqlx::query_as::<_, (bool,)>("SELECT is_active FROM api_keys WHERE id = $1::uuid")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match state {
            Some((true,)) => UsageOutcome::LimitReached,
            _ => UsageOutcome::Inactive,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OtpRow {
    id: String,
    user_id: String,
    email: String,
    code_hash: String,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<OtpRow> for OtpCode {
    type Error = StoreError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        let status = OtpStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown otp status '{}'", row.status)))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            email: row.email,
            code_hash: row.code_hash,
            status,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl OtpStore for PgStore {
    async fn insert_otp_within_limit(
        &self,
        otp: OtpCode,
        since: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Serialize issuance per user until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&otp.user_id)
            .execute(&mut *tx)
            .await?;

        let (recent,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM otp_codes WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(&otp.user_id)
        .bind(since)
        .fetch_one(&mut *tx)
        .await?;
        if recent >= i64::try_from(limit).unwrap_or(i64::MAX) {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO otp_codes (id, user_id, email, code_hash, status, created_at, expires_at) \
             VALUES ($1::uuid, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&otp.id)
        .bind(&otp.user_id)
        .bind(&otp.email)
        .bind(&otp.code_hash)
        .bind(otp.status.as_str())
        .bind(otp.created_at)
        .bind(otp.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn latest_otp(&self, user_id: &str) -> StoreResult<Option<OtpCode>> {
        let row = sqlx::query_as::<_, OtpRow>(&format!(
            "SELECT {OTP_COLUMNS} FROM otp_codes WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(OtpCode::try_from).transpose()
    }

    async fn mark_otp_used(&self, user_id: &str, id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE otp_codes SET status = 'USED' \
             WHERE id = $1::uuid AND user_id = $2 AND status = 'NOT_USED'",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
