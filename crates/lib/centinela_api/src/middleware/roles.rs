//! Role policy gate. Runs after `require_auth`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use centinela_core::auth::AuthError;
use centinela_core::auth::authorize::{RoutePolicy, authorize};
use tracing::debug;

use super::auth::AuthenticatedUser;
use crate::error::AppError;

/// Axum middleware: applies `policy` to the authenticated caller's roles.
pub async fn enforce_policy(
    State(policy): State<RoutePolicy>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !policy.public {
        let user = request
            .extensions()
            .get::<AuthenticatedUser>()
            .ok_or(AuthError::MissingCredentials)?;
        let decision = authorize(&policy, user.roles());
        if !decision.allowed {
            debug!(user_id = %user.id(), reason = ?decision.reason, "role policy denied");
        }
        decision.into_result()?;
    }
    Ok(next.run(request).await)
}
