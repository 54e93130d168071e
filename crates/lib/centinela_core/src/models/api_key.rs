//! API key models.
//!
//! The stored `key_hash` is a bcrypt hash. It is never serialized, so a record
//! can be returned to callers as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// API key record stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    pub id: String,
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    #[serde(rename = "system_name")]
    pub system_name: String,
    pub description: Option<String>,
    pub roles: Vec<String>,
    pub max_usage: Option<i64>,
    pub usage_count: i64,
    pub allowed_ips: Vec<String>,
    pub permissions: Vec<String>,
    pub expiration: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    /// Whether the usage cap has been reached.
    pub fn is_capped(&self) -> bool {
        matches!(self.max_usage, Some(max) if self.usage_count >= max)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiration, Some(exp) if exp <= now)
    }
}

/// Fields accepted when creating an API key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApiKey {
    #[serde(rename = "system_name")]
    pub system_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub max_usage: Option<i64>,
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

/// Partial update of an API key. `None` leaves a field unchanged; for the
/// nullable `maxUsage` and `expiration`, an explicit JSON `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyUpdate {
    #[serde(rename = "system_name", default)]
    pub system_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_usage: Option<Option<i64>>,
    #[serde(default)]
    pub allowed_ips: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl ApiKeyUpdate {
    /// Apply this patch to a record in place.
    pub fn apply(&self, record: &mut ApiKeyRecord) {
        if let Some(system_name) = &self.system_name {
            record.system_name = system_name.clone();
        }
        if let Some(description) = &self.description {
            record.description = Some(description.clone());
        }
        if let Some(roles) = &self.roles {
            record.roles = roles.clone();
        }
        if let Some(max_usage) = self.max_usage {
            record.max_usage = max_usage;
        }
        if let Some(allowed_ips) = &self.allowed_ips {
            record.allowed_ips = allowed_ips.clone();
        }
        if let Some(permissions) = &self.permissions {
            record.permissions = permissions.clone();
        }
        if let Some(expiration) = self.expiration {
            record.expiration = expiration;
        }
        if let Some(is_active) = self.is_active {
            record.is_active = is_active;
        }
    }
}

/// A field that is present in the body, possibly as `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Plaintext key and its record, returned once at creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedApiKey {
    pub key: String,
    pub is_active: bool,
    pub record: ApiKeyRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(max_usage: Option<i64>, usage_count: i64) -> ApiKeyRecord {
        ApiKeyRecord {
            id: "k1".into(),
            key_hash: "$2b$10$hash".into(),
            system_name: "System X".into(),
            description: None,
            roles: vec![],
            max_usage,
            usage_count,
            allowed_ips: vec![],
            permissions: vec![],
            expiration: None,
            is_active: true,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn uncapped_key_is_never_capped() {
        assert!(!record(None, 1_000_000).is_capped());
    }

    #[test]
    fn capped_at_max_usage() {
        assert!(!record(Some(3), 2).is_capped());
        assert!(record(Some(3), 3).is_capped());
    }

    #[test]
    fn key_hash_is_not_serialized() {
        let json = serde_json::to_value(record(None, 0)).unwrap();
        assert!(json.get("keyHash").is_none());
        assert_eq!(json["system_name"], "System X");
        assert_eq!(json["usageCount"], 0);
    }

    #[test]
    fn update_applies_only_present_fields() {
        let mut rec = record(Some(10), 4);
        ApiKeyUpdate {
            description: Some("ci".into()),
            is_active: Some(false),
            ..Default::default()
        }
        .apply(&mut rec);
        assert_eq!(rec.description.as_deref(), Some("ci"));
        assert!(!rec.is_active);
        assert_eq!(rec.max_usage, Some(10));
        assert_eq!(rec.system_name, "System X");
    }

    #[test]
    fn null_clears_nullable_fields_and_absence_keeps_them() {
        let mut rec = record(Some(10), 4);
        rec.expiration = Some(Utc::now());

        let keep: ApiKeyUpdate = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(keep.max_usage, None);
        keep.apply(&mut rec);
        assert_eq!(rec.max_usage, Some(10));
        assert!(rec.expiration.is_some());

        let clear: ApiKeyUpdate = serde_json::from_value(serde_json::json!({
            "maxUsage": null,
            "expiration": null
        }))
        .unwrap();
        assert_eq!(clear.max_usage, Some(None));
        clear.apply(&mut rec);
        assert_eq!(rec.max_usage, None);
        assert_eq!(rec.expiration, None);

        let set: ApiKeyUpdate =
            serde_json::from_value(serde_json::json!({ "maxUsage": 7 })).unwrap();
        set.apply(&mut rec);
        assert_eq!(rec.max_usage, Some(7));
    }
}
