//! Request gates, applied outermost first: API key, bearer token, role policy.

pub mod api_key;
pub mod auth;
pub mod roles;
