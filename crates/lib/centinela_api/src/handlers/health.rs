//! Liveness endpoint.

use axum::Json;

use crate::models::HealthResponse;

/// `GET /health`: reports the running core version. Not gated.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "centinela".into(),
        version: centinela_core::version().into(),
    })
}
