//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const POST_AUTH_VALIDATE_TOKEN: &str = "/auth/validate-token";
pub const POST_AUTH_REFRESH_TOKEN: &str = "/auth/refresh-token";

pub const POST_LEARNING_PLATFORM_LOGIN: &str = "/learning-platform/login";

pub const ROLES: &str = "/roles";
pub const ROLES_ID: &str = "/roles/{id}";
pub const PATCH_ROLES_ID_RESTRICTION: &str = "/roles/{id}/restriction";
pub const POST_ROLES_VALIDATE: &str = "/roles/validate";

pub const API_KEYS: &str = "/api-keys";
pub const API_KEYS_ID: &str = "/api-keys/{id}";
