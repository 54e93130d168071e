//! Request and response bodies.

use centinela_core::auth::verifier::TokenKind;
use centinela_core::models::auth::{SubjectClaim, TokenPair};
use serde::{Deserialize, Serialize};

/// Error body returned for every rejected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code.
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Token issued by the identity provider to the client.
    #[serde(alias = "firebaseToken")]
    pub provider_token: String,
}

/// Learning-platform credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPlatformLoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Token pair, in the wire shape clients already consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenResponse {
    pub message: String,
    pub token_type: String,
    pub user: SubjectClaim,
}

impl ValidateTokenResponse {
    pub fn new(user: SubjectClaim, kind: TokenKind) -> Self {
        let token_type = match kind {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        };
        Self {
            message: "The token is valid!".into(),
            token_type: token_type.into(),
            user,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub service: String,
    pub version: String,
}
