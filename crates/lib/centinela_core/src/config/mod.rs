//! Token configuration: signing secrets and expiry policy.
//!
//! Read once at startup and shared read-only afterwards. A missing secret is a
//! fatal startup error, never a per-request one.

use std::fmt;
use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;

/// Default access token lifetime.
pub const DEFAULT_ACCESS_EXPIRY: &str = "15m";

/// Default refresh token lifetime.
pub const DEFAULT_REFRESH_EXPIRY: &str = "24h";

/// Default per-call budget for identity source lookups.
pub const DEFAULT_IDENTITY_TIMEOUT: &str = "5s";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid duration for {key}: {value:?}")]
    InvalidDuration { key: &'static str, value: String },
}

/// Secrets and expiries for token issuance and verification.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 secret for access tokens (`JWT_SECRET`).
    pub access_secret: String,
    /// HS256 secret for refresh tokens (`JWT_REFRESH_SECRET`).
    pub refresh_secret: String,
    pub access_expiry: Duration,
    pub refresh_expiry: Duration,
    /// Timeout applied to each identity source lookup during refresh.
    pub identity_timeout: StdDuration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .field("identity_timeout", &self.identity_timeout)
            .finish()
    }
}

impl AuthConfig {
    /// Build a config with default expiries. Both secrets are required.
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_expiry: Duration::minutes(15),
            refresh_expiry: Duration::hours(24),
            identity_timeout: StdDuration::from_secs(5),
        };
        config.check_secrets()?;
        Ok(config)
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable                 | Default    |
    /// |--------------------------|------------|
    /// | `JWT_SECRET`             | (required) |
    /// | `JWT_REFRESH_SECRET`     | (required) |
    /// | `TOKEN_EXPIRE`           | `15m`      |
    /// | `JWT_REFRESH_EXPIRATION` | `24h`      |
    /// | `IDENTITY_TIMEOUT`       | `5s`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AuthConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let duration = |key: &'static str, default: &str| {
            let value = lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string());
            parse_duration(key, &value)
        };

        let access_secret = secret("JWT_SECRET")?;
        let refresh_secret = secret("JWT_REFRESH_SECRET")?;
        let access_expiry = duration("TOKEN_EXPIRE", DEFAULT_ACCESS_EXPIRY)?;
        let refresh_expiry = duration("JWT_REFRESH_EXPIRATION", DEFAULT_REFRESH_EXPIRY)?;
        let identity_timeout = duration("IDENTITY_TIMEOUT", DEFAULT_IDENTITY_TIMEOUT)?;

        Ok(Self {
            access_secret,
            refresh_secret,
            access_expiry: to_chrono("TOKEN_EXPIRE", access_expiry)?,
            refresh_expiry: to_chrono("JWT_REFRESH_EXPIRATION", refresh_expiry)?,
            identity_timeout,
        })
    }

    pub fn with_access_expiry(mut self, expiry: Duration) -> Self {
        self.access_expiry = expiry;
        self
    }

    pub fn with_refresh_expiry(mut self, expiry: Duration) -> Self {
        self.refresh_expiry = expiry;
        self
    }

    pub fn with_identity_timeout(mut self, timeout: StdDuration) -> Self {
        self.identity_timeout = timeout;
        self
    }

    /// Both secrets must be non-empty.
    pub fn check_secrets(&self) -> Result<(), ConfigError> {
        if self.access_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if self.refresh_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_REFRESH_SECRET"));
        }
        Ok(())
    }
}

/// Parse `15m`, `24h`, `1h 30m`, or a bare number of seconds.
fn parse_duration(key: &'static str, value: &str) -> Result<StdDuration, ConfigError> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(StdDuration::from_secs(secs));
    }
    humantime::parse_duration(value).map_err(|_| ConfigError::InvalidDuration {
        key,
        value: value.to_string(),
    })
}

fn to_chrono(key: &'static str, value: StdDuration) -> Result<Duration, ConfigError> {
    Duration::from_std(value).map_err(|_| ConfigError::InvalidDuration {
        key,
        value: format!("{value:?}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_expiries_unset() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "access"),
            ("JWT_REFRESH_SECRET", "refresh"),
        ]))
        .unwrap();
        assert_eq!(config.access_expiry, Duration::minutes(15));
        assert_eq!(config.refresh_expiry, Duration::hours(24));
        assert_eq!(config.identity_timeout, StdDuration::from_secs(5));
    }

    #[test]
    fn missing_access_secret_is_fatal() {
        let err = AuthConfig::from_lookup(lookup(&[("JWT_REFRESH_SECRET", "refresh")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn blank_refresh_secret_is_fatal() {
        let err = AuthConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "access"),
            ("JWT_REFRESH_SECRET", "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_REFRESH_SECRET")));
    }

    #[test]
    fn parses_humantime_and_seconds() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "access"),
            ("JWT_REFRESH_SECRET", "refresh"),
            ("TOKEN_EXPIRE", "30m"),
            ("JWT_REFRESH_EXPIRATION", "7200"),
        ]))
        .unwrap();
        assert_eq!(config.access_expiry, Duration::minutes(30));
        assert_eq!(config.refresh_expiry, Duration::hours(2));
    }

    #[test]
    fn rejects_garbage_duration() {
        let err = AuthConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "access"),
            ("JWT_REFRESH_SECRET", "refresh"),
            ("TOKEN_EXPIRE", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration {
                key: "TOKEN_EXPIRE",
                ..
            }
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AuthConfig::new("top-secret", "also-secret").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("also-secret"));
    }
}
