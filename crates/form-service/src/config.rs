//! Form service configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default identity cache TTL in seconds (two hours).
pub const DEFAULT_IDENTITY_CACHE_TTL_SECONDS: u64 = 7200;

/// Upper bound on the identity cache TTL in seconds (one day).
pub const MAX_IDENTITY_CACHE_TTL_SECONDS: u64 = 86_400;

/// Default interval between expired-entry sweeps in seconds.
pub const DEFAULT_IDENTITY_CACHE_SWEEP_SECONDS: u64 = 60;

/// Default session cookie name.
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "formaura_session";

/// Default allowed CORS origin (the frontend dev server).
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default database pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;

/// Form service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// How long a resolved identity may be served from the cache.
    pub identity_cache_ttl_seconds: u64,

    /// Optional bound on cached identities. Unbounded when `None`.
    pub identity_cache_max_entries: Option<usize>,

    /// Interval of the background sweep that drops expired identities.
    pub identity_cache_sweep_seconds: u64,

    /// Cookie carrying the session token when no bearer header is sent.
    pub session_cookie_name: String,

    /// Origin allowed to make credentialed cross-origin requests.
    pub cors_allowed_origin: String,

    pub request_timeout_seconds: u64,

    pub db_max_connections: u32,
}

impl Config {
    pub fn identity_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.identity_cache_ttl_seconds)
    }

    pub fn identity_cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.identity_cache_sweep_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("identity_cache_ttl_seconds", &self.identity_cache_ttl_seconds)
            .field("identity_cache_max_entries", &self.identity_cache_max_entries)
            .field(
                "identity_cache_sweep_seconds",
                &self.identity_cache_sweep_seconds,
            )
            .field("session_cookie_name", &self.session_cookie_name)
            .field("cors_allowed_origin", &self.cors_allowed_origin)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("db_max_connections", &self.db_max_connections)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid identity cache configuration: {0}")]
    InvalidIdentityCache(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Parse an optional positive integer variable.
fn parse_positive<T>(vars: &HashMap<String, String>, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: fmt::Display,
{
    let Some(value_str) = vars.get(name) else {
        return Ok(None);
    };

    let value: T = value_str.trim().parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("must be a valid positive integer, got '{}': {}", value_str, e),
    })?;

    if value <= T::default() {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    Ok(Some(value))
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let identity_cache_ttl_seconds =
            match parse_positive::<u64>(vars, "IDENTITY_CACHE_TTL_SECONDS") {
                Ok(Some(value)) if value > MAX_IDENTITY_CACHE_TTL_SECONDS => {
                    return Err(ConfigError::InvalidIdentityCache(format!(
                        "IDENTITY_CACHE_TTL_SECONDS must not exceed {} seconds, got {}",
                        MAX_IDENTITY_CACHE_TTL_SECONDS, value
                    )));
                }
                Ok(Some(value)) => value,
                Ok(None) => DEFAULT_IDENTITY_CACHE_TTL_SECONDS,
                Err(e) => return Err(ConfigError::InvalidIdentityCache(e.to_string())),
            };

        let identity_cache_max_entries = parse_positive::<usize>(vars, "IDENTITY_CACHE_MAX_ENTRIES")
            .map_err(|e| ConfigError::InvalidIdentityCache(e.to_string()))?;

        let identity_cache_sweep_seconds =
            parse_positive::<u64>(vars, "IDENTITY_CACHE_SWEEP_SECONDS")
                .map_err(|e| ConfigError::InvalidIdentityCache(e.to_string()))?
                .unwrap_or(DEFAULT_IDENTITY_CACHE_SWEEP_SECONDS);

        let session_cookie_name = match vars.get("SESSION_COOKIE_NAME") {
            Some(name) if name.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    name: "SESSION_COOKIE_NAME".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            Some(name) => name.trim().to_string(),
            None => DEFAULT_SESSION_COOKIE_NAME.to_string(),
        };

        let cors_allowed_origin = vars
            .get("CORS_ALLOWED_ORIGIN")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CORS_ALLOWED_ORIGIN.to_string());

        let request_timeout_seconds = parse_positive(vars, "REQUEST_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS);

        let db_max_connections =
            parse_positive(vars, "DB_MAX_CONNECTIONS")?.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

        Ok(Config {
            database_url,
            bind_address,
            identity_cache_ttl_seconds,
            identity_cache_max_entries,
            identity_cache_sweep_seconds,
            session_cookie_name,
            cors_allowed_origin,
            request_timeout_seconds,
            db_max_connections,
        })
    }
}
