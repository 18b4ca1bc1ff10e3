//! API Configuration Module
//!
//! Server, credential and cache settings. Configuration is loaded from
//! environment variables with defaults suitable for development; call
//! [`ApiConfig::validate_for_production`] before serving real traffic.

use secrecy::{ExposeSecret, SecretString};
use station_core::{ConfigError, DEFAULT_PREFIX_LEN, MAX_PREFIX_LEN, MIN_PREFIX_LEN};
use station_storage::CacheConfig;
use std::time::Duration;

/// Minimum pepper length accepted in production.
pub const MIN_PEPPER_BYTES: usize = 32;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Server
    // ========================================================================
    /// Bind address.
    pub bind: String,

    /// Listen port.
    pub port: u16,

    /// Largest request body accepted, in bytes.
    pub body_limit_bytes: usize,

    /// Deadline for a whole request.
    pub request_timeout: Duration,

    /// Deadline for each individual store call.
    pub storage_timeout: Duration,

    // ========================================================================
    // Credentials
    // ========================================================================
    /// Hex length of newly generated key prefixes.
    pub api_key_prefix_len: usize,

    /// HMAC key for secret digests. Without it, digests are plain SHA-256.
    pub api_key_pepper: Option<SecretString>,

    // ========================================================================
    // Cache
    // ========================================================================
    /// Logbook cache settings.
    pub cache: CacheConfig,

    // ========================================================================
    // CORS
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            body_limit_bytes: 64 * 1024,
            request_timeout: Duration::from_secs(30),
            storage_timeout: Duration::from_secs(5),
            api_key_prefix_len: DEFAULT_PREFIX_LEN,
            api_key_pepper: None,
            cache: CacheConfig::default(),
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STATION_API_BIND`: Bind address (default: 0.0.0.0)
    /// - `STATION_API_PORT` or `PORT`: Listen port (default: 3000)
    /// - `STATION_BODY_LIMIT_BYTES`: Request body limit (default: 65536)
    /// - `STATION_REQUEST_TIMEOUT_SECS`: Whole-request deadline (default: 30)
    /// - `STATION_STORAGE_TIMEOUT_SECS`: Per store call deadline (default: 5)
    /// - `STATION_API_KEY_PREFIX_LEN`: Generated prefix length (default: 12)
    /// - `STATION_API_KEY_PEPPER`: HMAC key for digests (optional)
    /// - `STATION_CACHE_MAX_ENTRIES`: Logbook cache capacity (default: 1024)
    /// - `STATION_CACHE_TTL_SECS`: Logbook cache TTL (default: 300)
    /// - `STATION_CACHE_ENABLED`: "false" disables the cache (default: true)
    /// - `STATION_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// their defaults; range checks are left to [`validate`](Self::validate).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind = lookup("STATION_API_BIND").unwrap_or(defaults.bind);

        let port = lookup("STATION_API_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let body_limit_bytes = lookup("STATION_BODY_LIMIT_BYTES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.body_limit_bytes);

        let request_timeout = lookup("STATION_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let storage_timeout = lookup("STATION_STORAGE_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.storage_timeout);

        let api_key_prefix_len = lookup("STATION_API_KEY_PREFIX_LEN")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.api_key_prefix_len);

        let api_key_pepper = lookup("STATION_API_KEY_PEPPER")
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::new(s.into()));

        let cache_enabled = lookup("STATION_CACHE_ENABLED")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let cache_max_entries = lookup("STATION_CACHE_MAX_ENTRIES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cache.max_entries);

        let cache_ttl = lookup("STATION_CACHE_TTL_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache.entry_ttl);

        let cors_origins = lookup("STATION_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            bind,
            port,
            body_limit_bytes,
            request_timeout,
            storage_timeout,
            api_key_prefix_len,
            api_key_pepper,
            cache: CacheConfig::new()
                .with_enabled(cache_enabled)
                .with_max_entries(cache_max_entries)
                .with_ttl(cache_ttl),
            cors_origins,
        }
    }

    /// `bind:port`, ready for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Check ranges that would make the server misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&self.api_key_prefix_len) {
            return Err(ConfigError::InvalidValue {
                field: "STATION_API_KEY_PREFIX_LEN".to_string(),
                value: self.api_key_prefix_len.to_string(),
                reason: format!("must be between {} and {}", MIN_PREFIX_LEN, MAX_PREFIX_LEN),
            });
        }
        if self.body_limit_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "STATION_BODY_LIMIT_BYTES".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "STATION_REQUEST_TIMEOUT_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.storage_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "STATION_STORAGE_TIMEOUT_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// [`validate`](Self::validate), plus a pepper of at least
    /// [`MIN_PEPPER_BYTES`].
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        self.validate()?;
        match &self.api_key_pepper {
            None => Err(ConfigError::MissingRequired {
                field: "STATION_API_KEY_PEPPER".to_string(),
            }),
            Some(pepper) if pepper.expose_secret().len() < MIN_PEPPER_BYTES => {
                Err(ConfigError::InvalidValue {
                    field: "STATION_API_KEY_PEPPER".to_string(),
                    value: "[REDACTED]".to_string(),
                    reason: format!("must be at least {} bytes", MIN_PEPPER_BYTES),
                })
            }
            Some(_) => Ok(()),
        }
    }
}
