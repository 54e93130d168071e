//! # centinela_api
//!
//! HTTP API library for Centinela.
//!
//! Every route except `/health` sits behind the API key gate. Session routes
//! need nothing more; role and API key management additionally require an
//! access token, and mutations require the admin role.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{MethodRouter, delete, get, patch, post, put};
use centinela_core::auth::authorize::RoutePolicy;
use centinela_core::auth::verifier::TokenVerifier;
use centinela_core::services::Services;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{api_keys, auth, health, roles};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub config: ApiConfig,
    /// Verifier used by the bearer gate; refresh tokens are not accepted there.
    pub access_verifier: TokenVerifier,
}

impl AppState {
    pub fn new(services: Services, config: ApiConfig) -> Self {
        let access_verifier = services.verifier.access_only();
        Self {
            services,
            config,
            access_verifier,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `centinela_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    centinela_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = RoutePolicy::admin(state.config.admin_role.clone());
    let admin_only = |route: MethodRouter<AppState>| {
        route.route_layer(from_fn_with_state(
            admin.clone(),
            middleware::roles::enforce_policy,
        ))
    };

    // API key only
    let sessions = Router::new()
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(
            routes::POST_AUTH_VALIDATE_TOKEN,
            post(auth::validate_token_handler),
        )
        .route(
            routes::POST_AUTH_REFRESH_TOKEN,
            post(auth::refresh_token_handler),
        )
        .route(
            routes::POST_LEARNING_PLATFORM_LOGIN,
            post(auth::learning_platform_login_handler),
        );

    // API key + access token; mutations need the admin role
    let management = Router::new()
        .route(
            routes::ROLES,
            get(roles::list_roles_handler).merge(admin_only(post(roles::create_role_handler))),
        )
        .route(
            routes::ROLES_ID,
            get(roles::get_role_handler)
                .merge(admin_only(put(roles::update_role_handler)))
                .merge(admin_only(delete(roles::delete_role_handler))),
        )
        .route(
            routes::PATCH_ROLES_ID_RESTRICTION,
            admin_only(patch(roles::toggle_restriction_handler)),
        )
        .route(
            routes::POST_ROLES_VALIDATE,
            post(roles::validate_roles_handler),
        )
        .route(
            routes::API_KEYS,
            admin_only(
                post(api_keys::create_api_key_handler).get(api_keys::list_api_keys_handler),
            ),
        )
        .route(
            routes::API_KEYS_ID,
            admin_only(
                get(api_keys::get_api_key_handler)
                    .patch(api_keys::update_api_key_handler)
                    .delete(api_keys::revoke_api_key_handler),
            ),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let gated = Router::new()
        .merge(sessions)
        .merge(management)
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::api_key::require_api_key,
        ));

    Router::new()
        .merge(gated)
        .route(routes::GET_HEALTH, get(health::health_handler))
        .layer(from_fn(log_request))
        .layer(cors)
        .with_state(state)
}

async fn log_request(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    tracing::debug!(%method, %path, status = %response.status(), "request handled");
    response
}
