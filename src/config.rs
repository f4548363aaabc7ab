use shuttle_runtime::SecretStore;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TOKEN_TTL_HOURS: u64 = 72;
const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not found in secrets")]
    Missing(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{key} must be a positive integer, got `{value}`")]
    InvalidDuration { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub database_url: String,
    pub token_ttl: Duration,
    pub product_cache_ttl: Duration,
}

impl AppConfig {
    pub fn from_secrets(secrets: &SecretStore) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| secrets.get(key))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::Empty("JWT_SECRET"));
        }

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let token_ttl_hours = positive(&lookup, "TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS)?;
        let token_ttl_secs = token_ttl_hours.checked_mul(60 * 60).ok_or_else(|| {
            ConfigError::InvalidDuration {
                key: "TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
            }
        })?;
        let cache_ttl_secs = positive(
            &lookup,
            "PRODUCT_CACHE_TTL_SECS",
            DEFAULT_PRODUCT_CACHE_TTL_SECS,
        )?;

        Ok(AppConfig {
            jwt_secret,
            database_url,
            token_ttl: Duration::from_secs(token_ttl_secs),
            product_cache_ttl: Duration::from_secs(cache_ttl_secs),
        })
    }
}

fn positive<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(ConfigError::InvalidDuration { key, value }),
        },
    }
}
