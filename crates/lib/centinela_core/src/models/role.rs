//! Role models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::uuid::uuidv7;

/// A platform role. `code` is the unique business key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
    pub code: String,
    pub description: String,
    pub associated_platform: String,
    pub x_api_key: String,
    pub restricted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Role {
    /// Build a new role with a fresh id.
    pub fn from_new(new: NewRole) -> Self {
        Self {
            id: uuidv7().to_string(),
            name: new.name,
            code: new.code,
            description: new.description,
            associated_platform: new.associated_platform,
            x_api_key: new.x_api_key,
            restricted: new.restricted,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Overwrite the editable fields and stamp `updated_at`.
    pub fn apply(&mut self, update: RoleUpdate, at: DateTime<Utc>) {
        self.name = update.name;
        self.code = update.code;
        self.description = update.description;
        self.associated_platform = update.associated_platform;
        self.x_api_key = update.x_api_key;
        self.updated_at = Some(at);
    }
}

/// Fields accepted when creating a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub name: String,
    pub code: String,
    pub description: String,
    pub associated_platform: String,
    pub x_api_key: String,
    #[serde(default)]
    pub restricted: bool,
}

impl NewRole {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            description: String::new(),
            associated_platform: String::new(),
            x_api_key: String::new(),
            restricted: false,
        }
    }
}

/// Fields accepted when updating a role. `restricted` is toggled separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    pub name: String,
    pub code: String,
    pub description: String,
    pub associated_platform: String,
    pub x_api_key: String,
}

/// Result of checking whether any of a set of role codes exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleValidation {
    /// Last matching role, if any.
    pub data: Option<Role>,
    pub is_valid_role: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_keeps_restriction_and_stamps_time() {
        let mut role = Role::from_new(NewRole {
            restricted: true,
            ..NewRole::new("Admin", "ADMIN")
        });
        let at = Utc::now();
        role.apply(
            RoleUpdate {
                name: "Administrator".into(),
                code: "ADMIN".into(),
                description: "full access".into(),
                associated_platform: "lms".into(),
                x_api_key: String::new(),
            },
            at,
        );
        assert_eq!(role.name, "Administrator");
        assert!(role.restricted);
        assert_eq!(role.updated_at, Some(at));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(Role::from_new(NewRole::new("User", "USER"))).unwrap();
        assert_eq!(json["code"], "USER");
        assert_eq!(json["associatedPlatform"], "");
        assert_eq!(json["restricted"], false);
    }
}
