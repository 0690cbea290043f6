// Application configuration
// Loaded from environment variables (optionally via a .env file)

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

/// Errors raised while reading configuration at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Runtime configuration for the voucher service
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// None disables the cache entirely (every lookup is a miss)
    pub redis_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub db_statement_timeout: Duration,
    pub cache_op_timeout: Duration,
    pub campaign_cache_ttl: Duration,
    pub voucher_cache_ttl: Duration,
    pub purchase_base_price: Decimal,
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    ///
    /// Used by `from_env` and by tests, which pass a map instead of
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            jwt_secret: required("JWT_SECRET")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            db_acquire_timeout: Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 3)?),
            db_statement_timeout: Duration::from_millis(parse_or(&lookup, "DB_STATEMENT_TIMEOUT_MS", 5000)?),
            cache_op_timeout: Duration::from_millis(parse_or(&lookup, "CACHE_OP_TIMEOUT_MS", 250)?),
            campaign_cache_ttl: Duration::from_secs(parse_or(&lookup, "CAMPAIGN_CACHE_TTL_SECS", 300)?),
            voucher_cache_ttl: Duration::from_secs(parse_or(&lookup, "VOUCHER_CACHE_TTL_SECS", 1800)?),
            purchase_base_price: parse_or(&lookup, "PURCHASE_BASE_PRICE", Decimal::from(100))?,
        })
    }

    /// Socket address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
