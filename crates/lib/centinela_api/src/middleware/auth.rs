//! Authentication middleware: Bearer token extraction and verification.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum::http::header::AUTHORIZATION;
use centinela_core::auth::AuthError;
use centinela_core::auth::verifier::VerifiedToken;

use crate::AppState;
use crate::error::AppError;

/// Verified caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub VerifiedToken);

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.0.claim.id
    }

    pub fn roles(&self) -> &[String] {
        &self.0.claim.roles
    }
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, runs the
/// access-token verifier, and injects `AuthenticatedUser` into request
/// extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let verified = state.access_verifier.verify(Some(token)).await?;
    request.extensions_mut().insert(AuthenticatedUser(verified));

    Ok(next.run(request).await)
}
