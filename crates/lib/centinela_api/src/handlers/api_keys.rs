//! API key management request handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use centinela_core::api_keys::DEFAULT_PAGE_SIZE;
use centinela_core::models::api_key::{ApiKeyRecord, ApiKeyUpdate, CreatedApiKey, NewApiKey};
use tracing::info;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{MessageResponse, PageQuery};

/// `POST /api-keys`: the response is the only place the plaintext key appears.
pub async fn create_api_key_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Json(body): Json<NewApiKey>,
) -> AppResult<(StatusCode, Json<CreatedApiKey>)> {
    let created = state.services.api_keys.create(body).await?;
    info!(key_id = %created.record.id, by = %user.id(), "api key issued");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api-keys?page=&limit=`: active keys only.
pub async fn list_api_keys_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Vec<ApiKeyRecord>>> {
    let keys = state
        .services
        .api_keys
        .list_active(
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(Json(keys))
}

/// `GET /api-keys/{id}`
pub async fn get_api_key_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiKeyRecord>> {
    Ok(Json(state.services.api_keys.get(&id).await?))
}

/// `PATCH /api-keys/{id}`
pub async fn update_api_key_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ApiKeyUpdate>,
) -> AppResult<Json<ApiKeyRecord>> {
    Ok(Json(state.services.api_keys.update(&id, body).await?))
}

/// `DELETE /api-keys/{id}`: deactivate a key.
pub async fn revoke_api_key_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.services.api_keys.revoke(&id).await?;
    Ok(Json(MessageResponse::new("API key revoked")))
}
