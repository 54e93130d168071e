//! Domain models shared by the core services and the store backends.

pub mod api_key;
pub mod auth;
pub mod otp;
pub mod role;
