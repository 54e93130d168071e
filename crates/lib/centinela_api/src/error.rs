//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use centinela_core::auth::AuthError;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Auth(e) => auth_status(e),
        }
    }
}

fn auth_status(e: &AuthError) -> StatusCode {
    match e {
        AuthError::MissingCredentials
        | AuthError::InvalidToken
        | AuthError::MalformedToken(_)
        | AuthError::ExpiredRefreshToken
        | AuthError::InvalidRefreshToken
        | AuthError::RevokedToken
        | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AuthError::UserDeleted
        | AuthError::InvalidRole
        | AuthError::UsageLimitExceeded
        | AuthError::AccountSuspended
        | AuthError::AccountUnconfirmed
        | AuthError::OtpUsed
        | AuthError::OtpExpired
        | AuthError::OtpInvalid => StatusCode::FORBIDDEN,
        AuthError::UserNotFound | AuthError::IdentityNotFound | AuthError::NotFound(_) => {
            StatusCode::NOT_FOUND
        }
        AuthError::AlreadyRevoked => StatusCode::CONFLICT,
        AuthError::OtpRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        AuthError::Validation(_) => StatusCode::BAD_REQUEST,
        AuthError::IdentityUnavailable(_)
        | AuthError::KeyValidation(_)
        | AuthError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Signing(_) | AuthError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, message) = match &self {
            AppError::Validation(m) => ("validation_error", m.clone()),
            AppError::Unauthorized(m) => ("unauthorized", m.clone()),
            AppError::Auth(e) => (e.kind(), public_message(e)),
        };
        if status.is_server_error() {
            error!(kind = error, "{self}");
        } else {
            warn!(kind = error, %status, "{message}");
        }
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });
        (status, body).into_response()
    }
}

/// Backend failures carry driver and provider detail; only the kind is sent.
fn public_message(e: &AuthError) -> String {
    match e {
        AuthError::IdentityUnavailable(_) => "Identity source unavailable".into(),
        AuthError::KeyValidation(_) => "Error validating API key".into(),
        AuthError::Persistence(_) => "Storage unavailable".into(),
        AuthError::Signing(_) | AuthError::Configuration(_) => "Internal server error".into(),
        other => other.to_string(),
    }
}
