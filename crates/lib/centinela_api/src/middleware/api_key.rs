//! API key gate.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Header carrying the caller system's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Axum middleware: rejects requests without a valid `x-api-key`.
///
/// Every accepted request counts against the key's usage cap.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized("API key is missing".into()))?;

    if !state.services.api_keys.validate(key).await? {
        debug!(path = %request.uri().path(), "rejected unknown api key");
        return Err(AppError::Unauthorized("Invalid API key".into()));
    }

    Ok(next.run(request).await)
}
