//! # centinela_core
//!
//! Core authentication and authorization logic for Centinela.
//!
//! Token issuance and verification, the whitelist ledger, refresh rotation,
//! role decisions, API key metering and one-time passwords live here. Storage and identity
//! federation are reached through the traits in [`store`] and [`identity`].

pub mod api_keys;
pub mod auth;
pub mod config;
pub mod identity;
pub mod migrate;
pub mod models;
pub mod otp;
pub mod roles;
pub mod services;
pub mod store;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
