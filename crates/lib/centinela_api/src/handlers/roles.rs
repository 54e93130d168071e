//! Role management request handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use centinela_core::models::role::{NewRole, Role, RoleUpdate, RoleValidation};

use crate::AppState;
use crate::error::AppResult;
use crate::models::{MessageResponse, ValidateRolesRequest};

/// `GET /roles`
pub async fn list_roles_handler(State(state): State<AppState>) -> AppResult<Json<Vec<Role>>> {
    Ok(Json(state.services.roles.list().await?))
}

/// `GET /roles/{id}`
pub async fn get_role_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Role>> {
    Ok(Json(state.services.roles.get(&id).await?))
}

/// `POST /roles`
pub async fn create_role_handler(
    State(state): State<AppState>,
    Json(body): Json<NewRole>,
) -> AppResult<(StatusCode, Json<Role>)> {
    let role = state.services.roles.create(body).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// `PUT /roles/{id}`
pub async fn update_role_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RoleUpdate>,
) -> AppResult<Json<Role>> {
    Ok(Json(state.services.roles.update(&id, body).await?))
}

/// `PATCH /roles/{id}/restriction`: flip the `restricted` flag.
pub async fn toggle_restriction_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Role>> {
    Ok(Json(state.services.roles.toggle_restriction(&id).await?))
}

/// `DELETE /roles/{id}`
pub async fn delete_role_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.services.roles.delete(&id).await?;
    Ok(Json(MessageResponse::new("Role deleted successfully!")))
}

/// `POST /roles/validate`: whether any of the given codes is a role.
pub async fn validate_roles_handler(
    State(state): State<AppState>,
    Json(body): Json<ValidateRolesRequest>,
) -> AppResult<Json<RoleValidation>> {
    Ok(Json(
        state.services.roles.validate_existence(&body.roles).await?,
    ))
}
