use std::env;
use std::fmt;

use chrono::Duration;
use thiserror::Error;

use crate::services::access_tokens::DEFAULT_ACCESS_TOKEN_TTL_SECS;
use crate::services::refresh_tokens::DEFAULT_REFRESH_TOKEN_TTL_DAYS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} has an invalid value")]
    Invalid(&'static str),
}

pub const MAX_ACCESS_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 10 * 365;
pub const MAX_STORE_TIMEOUT_MS: u64 = 60_000;

/// Process-wide configuration, loaded once at start-up and shared read-only.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub polka_key: String,
    pub platform: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_days: i64,
    pub store_timeout_ms: u64,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:chirpy.db?mode=rwc".to_string()),
            jwt_secret: required_var("JWT_SECRET")?,
            polka_key: required_var("POLKA_KEY")?,
            platform: env::var("PLATFORM").unwrap_or_else(|_| "prod".to_string()),
            access_token_ttl_secs: parse_bounded_var(
                "ACCESS_TOKEN_TTL_SECS",
                DEFAULT_ACCESS_TOKEN_TTL_SECS,
                MAX_ACCESS_TOKEN_TTL_SECS,
            )?,
            refresh_token_ttl_days: parse_bounded_var(
                "REFRESH_TOKEN_TTL_DAYS",
                DEFAULT_REFRESH_TOKEN_TTL_DAYS,
                MAX_REFRESH_TOKEN_TTL_DAYS,
            )?,
            store_timeout_ms: parse_bounded_var("STORE_TIMEOUT_MS", 5000, MAX_STORE_TIMEOUT_MS)?,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost".to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
        })
    }

    pub fn is_dev(&self) -> bool {
        self.platform == "dev"
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::seconds(self.access_token_ttl_secs)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_ttl_days)
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}

// Secrets stay out of logs and panic messages.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("polka_key", &"<redacted>")
            .field("platform", &self.platform)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Like `parse_var`, but the value must lie in `1..=max`.
fn parse_bounded_var<T>(name: &'static str, default: T, max: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
{
    let value = parse_var(name, default)?;
    if value < T::from(1) || value > max {
        return Err(ConfigError::Invalid(name));
    }
    Ok(value)
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-jwt-secret".to_string(),
            polka_key: "test-polka-key".to_string(),
            platform: "dev".to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 60,
            store_timeout_ms: 5000,
            cors_origins: vec!["http://localhost".to_string()],
        }
    }
}
