//! Role management.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::auth::AuthError;
use crate::models::role::{NewRole, Role, RoleUpdate, RoleValidation};
use crate::store::{RoleStore, StoreError};
use crate::uuid::parse_id;

#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn RoleStore>,
}

impl RoleService {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Role>, AuthError> {
        Ok(self.store.list_roles().await?)
    }

    pub async fn get(&self, id: &str) -> Result<Role, AuthError> {
        check_id(id)?;
        self.store.get_role(id).await?.ok_or_else(not_found)
    }

    pub async fn create(&self, new: NewRole) -> Result<Role, AuthError> {
        check_fields(&new.name, &new.code)?;
        let role = self
            .store
            .insert_role(Role::from_new(new))
            .await
            .map_err(duplicate_code)?;
        info!(role_id = %role.id, code = %role.code, "role created");
        Ok(role)
    }

    pub async fn update(&self, id: &str, update: RoleUpdate) -> Result<Role, AuthError> {
        check_id(id)?;
        check_fields(&update.name, &update.code)?;
        let mut role = self.store.get_role(id).await?.ok_or_else(not_found)?;
        role.apply(update, Utc::now());
        self.store
            .replace_role(role)
            .await
            .map_err(duplicate_code)?
            .ok_or_else(not_found)
    }

    /// Flip the `restricted` flag.
    pub async fn toggle_restriction(&self, id: &str) -> Result<Role, AuthError> {
        check_id(id)?;
        let role = self
            .store
            .toggle_role_restriction(id, Utc::now())
            .await?
            .ok_or_else(not_found)?;
        info!(role_id = %role.id, restricted = role.restricted, "role restriction toggled");
        Ok(role)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AuthError> {
        check_id(id)?;
        if !self.store.delete_role(id).await? {
            return Err(not_found());
        }
        info!(role_id = %id, "role deleted");
        Ok(())
    }

    /// Whether any of `codes` names an existing role. `data` is the last
    /// match in `codes` order.
    pub async fn validate_existence(&self, codes: &[String]) -> Result<RoleValidation, AuthError> {
        let found = self.store.find_roles_by_codes(codes).await?;
        let data = codes
            .iter()
            .rev()
            .find_map(|code| found.iter().find(|r| &r.code == code).cloned());
        Ok(RoleValidation {
            is_valid_role: data.is_some(),
            data,
        })
    }
}

fn check_id(id: &str) -> Result<(), AuthError> {
    parse_id(id)
        .map(|_| ())
        .ok_or_else(|| AuthError::Validation("Invalid id".into()))
}

fn check_fields(name: &str, code: &str) -> Result<(), AuthError> {
    if name.trim().is_empty() || code.trim().is_empty() {
        return Err(AuthError::Validation("name and code are required".into()));
    }
    Ok(())
}

fn not_found() -> AuthError {
    AuthError::NotFound("Role not found".into())
}

fn duplicate_code(e: StoreError) -> AuthError {
    match e {
        StoreError::Conflict(message) => AuthError::Validation(message),
        other => AuthError::Persistence(other),
    }
}
