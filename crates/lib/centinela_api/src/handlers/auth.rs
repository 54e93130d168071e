//! Authentication request handlers.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{
    LearningPlatformLoginRequest, LoginRequest, MessageResponse, RefreshRequest, TokenRequest,
    TokenResponse, ValidateTokenResponse,
};

/// `POST /auth/login`: exchange an identity provider token for a token pair.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state.services.sessions.login(&body.provider_token).await?;
    Ok(Json(pair.into()))
}

/// `POST /learning-platform/login`: log in a mirrored learning-platform account.
pub async fn learning_platform_login_handler(
    State(state): State<AppState>,
    Json(body): Json<LearningPlatformLoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state
        .services
        .sessions
        .login_learning_platform(&body.username, &body.email)
        .await?;
    Ok(Json(pair.into()))
}

/// `POST /auth/logout`: revoke a token.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.services.sessions.logout(&body.token).await?;
    Ok(Json(MessageResponse::new("Token revoked")))
}

/// `POST /auth/validate-token`: check a token of either class.
pub async fn validate_token_handler(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> AppResult<Json<ValidateTokenResponse>> {
    let verified = state.services.sessions.validate_token(&body.token).await?;
    Ok(Json(ValidateTokenResponse::new(verified.claim, verified.kind)))
}

/// `POST /auth/refresh-token`: rotate a refresh token into a new pair.
pub async fn refresh_token_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state.services.refresh.refresh(&body.refresh_token).await?;
    Ok(Json(pair.into()))
}
