//! Authentication and authorization logic.
//!
//! Token signing and verification, the whitelist ledger, refresh rotation,
//! role decisions and the login/logout/validate flows. Shared by
//! `centinela_api` and anything else that needs to gate requests.

pub mod authorize;
pub mod issuer;
pub mod refresh;
pub mod session;
pub mod signer;
pub mod verifier;
pub mod whitelist;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Authentication and authorization errors.
///
/// Every failure path has its own variant so callers can branch and log on
/// [`AuthError::kind`] without parsing messages. Messages never contain
/// secrets, tokens or key hashes.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Refresh token has expired")]
    ExpiredRefreshToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("User not found")]
    UserNotFound,

    #[error("User has been deleted")]
    UserDeleted,

    #[error("User has no valid role")]
    InvalidRole,

    #[error("User account is suspended")]
    AccountSuspended,

    #[error("User account is not confirmed")]
    AccountUnconfirmed,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("User not found in any identity source")]
    IdentityNotFound,

    #[error("Identity source unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("API key usage limit reached")]
    UsageLimitExceeded,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Token already revoked")]
    AlreadyRevoked,

    #[error("No more than {limit} OTP codes can be generated in {window}")]
    OtpRateLimited { limit: usize, window: String },

    #[error("This code has already been used")]
    OtpUsed,

    #[error("This code has already expired")]
    OtpExpired,

    #[error("This code is not valid")]
    OtpInvalid,

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("API key validation failed: {0}")]
    KeyValidation(#[source] StoreError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl AuthError {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidToken => "invalid_token",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::ExpiredRefreshToken => "expired_refresh_token",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::UserNotFound => "user_not_found",
            AuthError::UserDeleted => "user_deleted",
            AuthError::InvalidRole => "invalid_role",
            AuthError::AccountSuspended => "account_suspended",
            AuthError::AccountUnconfirmed => "account_unconfirmed",
            AuthError::RevokedToken => "revoked_token",
            AuthError::IdentityNotFound => "identity_not_found",
            AuthError::IdentityUnavailable(_) => "identity_unavailable",
            AuthError::Unauthorized(_) => "unauthorized",
            AuthError::UsageLimitExceeded => "usage_limit_exceeded",
            AuthError::NotFound(_) => "not_found",
            AuthError::AlreadyRevoked => "already_revoked",
            AuthError::OtpRateLimited { .. } => "otp_rate_limited",
            AuthError::OtpUsed => "otp_used",
            AuthError::OtpExpired => "otp_expired",
            AuthError::OtpInvalid => "otp_invalid",
            AuthError::Signing(_) => "signing_error",
            AuthError::Configuration(_) => "configuration_error",
            AuthError::Validation(_) => "validation_error",
            AuthError::KeyValidation(_) => "validation_error",
            AuthError::Persistence(_) => "persistence_error",
        }
    }
}

/// Short SHA-256 fingerprint of a token, safe to put in logs.
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = token_fingerprint("eyJhbGciOiJIUzI1NiJ9.payload.sig");
        let b = token_fingerprint("eyJhbGciOiJIUzI1NiJ9.payload.sig");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert_ne!(a, token_fingerprint("other"));
    }

    #[test]
    fn persistence_and_key_validation_stay_distinct() {
        let persistence = AuthError::from(StoreError::Backend("down".into()));
        let validation = AuthError::KeyValidation(StoreError::Backend("down".into()));
        assert_eq!(persistence.kind(), "persistence_error");
        assert_eq!(validation.kind(), "validation_error");
    }
}
