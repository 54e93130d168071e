//! In-memory store backend.
//!
//! Implements every store trait on top of `DashMap`s. Not durable: all state
//! is lost on restart. Conditional updates run under the shard lock of the
//! entry being modified, which makes them atomic within one process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

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

#[derive(Debug, Default)]
pub struct MemoryStore {
    whitelist: DashMap<String, WhitelistEntry>,
    roles: DashMap<String, Role>,
    /// code → role id
    role_codes: DashMap<String, String>,
    users: DashMap<String, User>,
    learning_users: DashMap<String, LearningPlatformAccount>,
    api_keys: DashMap<String, ApiKeyRecord>,
    /// user id → codes in creation order
    otps: DashMap<String, Vec<OtpCode>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a local user.
    pub fn put_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Seed or replace a learning-platform account.
    pub fn put_learning_user(&self, account: LearningPlatformAccount) {
        self.learning_users.insert(account.id.clone(), account);
    }

    /// Overwrite a key's usage counter without touching `is_active`.
    pub fn set_key_usage(&self, id: &str, usage_count: i64) -> bool {
        match self.api_keys.get_mut(id) {
            Some(mut record) => {
                record.usage_count = usage_count;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl WhitelistStore for MemoryStore {
    async fn insert_entry(&self, entry: WhitelistEntry) -> StoreResult<()> {
        match self.whitelist.entry(entry.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict("token already registered".into())),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    async fn find_entry(&self, token: &str) -> StoreResult<Option<WhitelistEntry>> {
        Ok(self.whitelist.get(token).map(|e| e.clone()))
    }

    async fn deactivate_entry(
        &self,
        token: &str,
        at: DateTime<Utc>,
        by: Option<&str>,
    ) -> StoreResult<RevokeOutcome> {
        let Some(mut entry) = self.whitelist.get_mut(token) else {
            return Ok(RevokeOutcome::Missing);
        };
        if entry.status == WhitelistStatus::Idle {
            return Ok(RevokeOutcome::AlreadyIdle);
        }
        entry.status = WhitelistStatus::Idle;
        entry.updated_at = Some(at);
        entry.updated_by = by.map(str::to_string);
        Ok(RevokeOutcome::Revoked)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.roles.iter().map(|r| r.clone()).collect();
        roles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(roles)
    }

    async fn get_role(&self, id: &str) -> StoreResult<Option<Role>> {
        Ok(self.roles.get(id).map(|r| r.clone()))
    }

    async fn find_roles_by_codes(&self, codes: &[String]) -> StoreResult<Vec<Role>> {
        Ok(codes
            .iter()
            .filter_map(|code| self.role_codes.get(code).map(|id| id.clone()))
            .filter_map(|id| self.roles.get(&id).map(|r| r.clone()))
            .collect())
    }

    async fn insert_role(&self, role: Role) -> StoreResult<Role> {
        match self.role_codes.entry(role.code.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "role code '{}' already exists",
                role.code
            ))),
            Entry::Vacant(slot) => {
                slot.insert(role.id.clone());
                self.roles.insert(role.id.clone(), role.clone());
                Ok(role)
            }
        }
    }

    async fn replace_role(&self, role: Role) -> StoreResult<Option<Role>> {
        let Some(previous_code) = self.roles.get(&role.id).map(|r| r.code.clone()) else {
            return Ok(None);
        };
        if previous_code != role.code {
            match self.role_codes.entry(role.code.clone()) {
                Entry::Occupied(_) => {
                    return Err(StoreError::Conflict(format!(
                        "role code '{}' already exists",
                        role.code
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(role.id.clone());
                }
            }
            self.role_codes.remove(&previous_code);
        }
        self.roles.insert(role.id.clone(), role.clone());
        Ok(Some(role))
    }

    async fn toggle_role_restriction(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Role>> {
        Ok(self.roles.get_mut(id).map(|mut role| {
            role.restricted = !role.restricted;
            role.updated_at = Some(at);
            role.clone()
        }))
    }

    async fn delete_role(&self, id: &str) -> StoreResult<bool> {
        match self.roles.remove(id) {
            Some((_, role)) => {
                self.role_codes.remove(&role.code);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.clone()))
    }
}

#[async_trait]
impl LearningPlatformDirectory for MemoryStore {
    async fn find_one(&self, id: &str) -> StoreResult<Option<Identity>> {
        Ok(self.learning_users.get(id).map(|u| u.identity()))
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> StoreResult<Option<LearningPlatformAccount>> {
        Ok(self
            .learning_users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.clone()))
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn insert_key(&self, record: ApiKeyRecord) -> StoreResult<ApiKeyRecord> {
        match self.api_keys.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "api key '{}' already exists",
                record.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get_key(&self, id: &str) -> StoreResult<Option<ApiKeyRecord>> {
        Ok(self.api_keys.get(id).map(|k| k.clone()))
    }

    async fn list_active_keys(
        &self,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ApiKeyRecord>> {
        let mut keys: Vec<ApiKeyRecord> = self
            .api_keys
            .iter()
            .filter(|k| k.is_active)
            .map(|k| k.clone())
            .collect();
        keys.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let keys = keys.into_iter().skip(offset);
        Ok(match limit {
            Some(limit) => keys.take(limit).collect(),
            None => keys.collect(),
        })
    }

    async fn update_key(
        &self,
        id: &str,
        patch: &ApiKeyUpdate,
    ) -> StoreResult<Option<ApiKeyRecord>> {
        Ok(self.api_keys.get_mut(id).map(|mut record| {
            patch.apply(&mut record);
            record.clone()
        }))
    }

    async fn deactivate_key(&self, id: &str) -> StoreResult<bool> {
        match self.api_keys.get_mut(id) {
            Some(mut record) => {
                record.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_key_usage(&self, id: &str, at: DateTime<Utc>) -> StoreResult<UsageOutcome> {
        let Some(mut record) = self.api_keys.get_mut(id) else {
            return Ok(UsageOutcome::Inactive);
        };
        if !record.is_active {
            return Ok(UsageOutcome::Inactive);
        }
        if record.is_capped() {
            return Ok(UsageOutcome::LimitReached);
        }
        record.usage_count += 1;
        record.last_used_at = Some(at);
        Ok(UsageOutcome::Recorded(record.clone()))
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn insert_otp_within_limit(
        &self,
        otp: OtpCode,
        since: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<bool> {
        let mut codes = self.otps.entry(otp.user_id.clone()).or_default();
        let recent = codes.iter().filter(|c| c.created_at >= since).count();
        if recent >= limit {
            return Ok(false);
        }
        codes.push(otp);
        Ok(true)
    }

    async fn latest_otp(&self, user_id: &str) -> StoreResult<Option<OtpCode>> {
        Ok(self
            .otps
            .get(user_id)
            .and_then(|codes| codes.iter().max_by_key(|c| c.created_at).cloned()))
    }

    async fn mark_otp_used(&self, user_id: &str, id: &str) -> StoreResult<bool> {
        let Some(mut codes) = self.otps.get_mut(user_id) else {
            return Ok(false);
        };
        match codes
            .iter_mut()
            .find(|c| c.id == id && c.status == OtpStatus::NotUsed)
        {
            Some(code) => {
                code.status = OtpStatus::Used;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: &str, code: &str) -> Role {
        Role {
            id: id.into(),
            name: code.into(),
            code: code.into(),
            description: "test role".into(),
            associated_platform: "web".into(),
            x_api_key: "api-key-web".into(),
            restricted: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_token_is_a_conflict() {
        let store = MemoryStore::new();
        store
            .insert_entry(WhitelistEntry::active("t1", None))
            .await
            .unwrap();
        let err = store
            .insert_entry(WhitelistEntry::active("t1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn deactivate_entry_is_compare_and_set() {
        let store = MemoryStore::new();
        store
            .insert_entry(WhitelistEntry::active("t1", None))
            .await
            .unwrap();

        let now = Utc::now();
        assert_eq!(
            store.deactivate_entry("t1", now, Some("u1")).await.unwrap(),
            RevokeOutcome::Revoked
        );
        assert_eq!(
            store.deactivate_entry("t1", now, None).await.unwrap(),
            RevokeOutcome::AlreadyIdle
        );
        assert_eq!(
            store.deactivate_entry("nope", now, None).await.unwrap(),
            RevokeOutcome::Missing
        );

        let entry = store.find_entry("t1").await.unwrap().unwrap();
        assert_eq!(entry.status, WhitelistStatus::Idle);
        assert_eq!(entry.updated_by.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn role_codes_are_unique() {
        let store = MemoryStore::new();
        store.insert_role(role("r1", "ADMIN")).await.unwrap();
        let err = store.insert_role(role("r2", "ADMIN")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn replace_role_moves_code_index() {
        let store = MemoryStore::new();
        store.insert_role(role("r1", "OLD")).await.unwrap();
        store.replace_role(role("r1", "NEW")).await.unwrap().unwrap();

        let found = store
            .find_roles_by_codes(&["OLD".into(), "NEW".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "NEW");

        // The old code is free again.
        store.insert_role(role("r2", "OLD")).await.unwrap();
    }

    #[tokio::test]
    async fn delete_role_frees_code() {
        let store = MemoryStore::new();
        store.insert_role(role("r1", "ADMIN")).await.unwrap();
        assert!(store.delete_role("r1").await.unwrap());
        assert!(!store.delete_role("r1").await.unwrap());
        assert!(
            store
                .find_roles_by_codes(&["ADMIN".into()])
                .await
                .unwrap()
                .is_empty()
        );
    }
}
