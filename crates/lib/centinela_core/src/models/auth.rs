//! Authentication domain models.
//!
//! These are internal domain models, distinct from the HTTP request/response
//! shapes in `centinela_api`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and roles embedded in every signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectClaim {
    pub id: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl SubjectClaim {
    pub fn new(id: impl Into<String>, email: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            roles,
        }
    }
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject claim (id, email, roles).
    pub sub: SubjectClaim,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Unique token id (UUIDv7), keeps same-second issuances distinct.
    pub jti: String,
}

/// Access + refresh token pair returned by login and refresh flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Ledger status of an issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WhitelistStatus {
    Active,
    Idle,
}

impl WhitelistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhitelistStatus::Active => "ACTIVE",
            WhitelistStatus::Idle => "IDLE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(WhitelistStatus::Active),
            "IDLE" => Some(WhitelistStatus::Idle),
            _ => None,
        }
    }
}

/// Whitelist ledger entry. Never physically deleted by normal flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntry {
    pub token: String,
    pub status: WhitelistStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

impl WhitelistEntry {
    /// A fresh ACTIVE entry.
    pub fn active(token: impl Into<String>, created_by: Option<String>) -> Self {
        Self {
            token: token.into(),
            status: WhitelistStatus::Active,
            created_at: Utc::now(),
            created_by,
            updated_at: None,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WhitelistStatus::Active
    }
}

/// Local user record. Owned elsewhere; read-only here.
///
/// Users are keyed by their federated subject id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub roles: Vec<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Identity resolved from one of the identity sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

/// Role given to learning-platform accounts synced without one.
pub const DEFAULT_LEARNING_ROLE: &str = "BASIC";

/// A learning-platform user as mirrored into the local directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPlatformAccount {
    pub id: String,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    pub confirmed: bool,
    pub suspended: bool,
}

impl LearningPlatformAccount {
    /// A confirmed, active account with the default role.
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: email.into(),
            roles: vec![DEFAULT_LEARNING_ROLE.to_string()],
            confirmed: true,
            suspended: false,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
        }
    }
}
