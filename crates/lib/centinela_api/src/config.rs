//! API server configuration.

use std::fmt;

/// Default admin override role for management routes.
pub const DEFAULT_ADMIN_ROLE: &str = "ADMIN";

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Identity provider REST root.
    pub identity_api_url: String,
    /// Identity provider API key.
    pub identity_api_key: String,
    /// Role that grants access to role and API key management.
    pub admin_role: String,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("identity_api_url", &self.identity_api_url)
            .field("admin_role", &self.admin_role)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable           | Default                                      |
    /// |--------------------|----------------------------------------------|
    /// | `BIND_ADDR`        | `127.0.0.1:3100`                             |
    /// | `DATABASE_URL`     | `postgres://localhost:5432/centinela`        |
    /// | `IDENTITY_API_URL` | `https://identitytoolkit.googleapis.com`     |
    /// | `IDENTITY_API_KEY` | empty                                        |
    /// | `ADMIN_ROLE`       | `ADMIN`                                      |
    ///
    /// Token secrets and expiries are read separately by
    /// `centinela_core::config::AuthConfig::from_env`.
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/centinela".into()),
            identity_api_url: std::env::var("IDENTITY_API_URL")
                .unwrap_or_else(|_| "https://identitytoolkit.googleapis.com".into()),
            identity_api_key: std::env::var("IDENTITY_API_KEY").unwrap_or_default(),
            admin_role: std::env::var("ADMIN_ROLE")
                .ok()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ADMIN_ROLE.into()),
        }
    }

    /// Local defaults, for tests.
    pub fn local() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: String::new(),
            identity_api_url: String::new(),
            identity_api_key: String::new(),
            admin_role: DEFAULT_ADMIN_ROLE.into(),
        }
    }
}
