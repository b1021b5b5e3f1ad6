//! Configuration Module
//!
//! Handles loading backend selection and service parameters from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::services::{DEFAULT_BASE_QUOTA, DEFAULT_SESSION_TTL};

/// Process configuration.
///
/// All values can be configured via environment variables with sensible defaults.
/// Backend selection is resolved once, by [`Config::backend`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Use the Redis backend instead of the in-process map
    pub redis_enabled: bool,
    /// Full connection URL, takes precedence over host/port
    pub redis_url: Option<String>,
    pub redis_host: Option<String>,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    pub redis_db: i64,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Daily usage allowance before bonuses
    pub base_daily_quota: i64,
    /// Lifetime of a cached session in seconds
    pub session_ttl: u64,
    /// Maintenance task interval in seconds
    pub maintenance_interval: u64,
    /// Fixed offset for the quota day boundary, None = process local time
    pub quota_utc_offset_minutes: Option<i32>,
}

/// Resolved backend choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Memory,
    Redis {
        url: String,
        connect_timeout: Duration,
    },
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory` or `redis` (default: memory)
    /// - `REDIS_ENABLED` - `true`/`1` also selects redis
    /// - `REDIS_URL` - connection URL, e.g. `redis://127.0.0.1:6379/0`
    /// - `REDIS_HOST`, `REDIS_PORT` (6379), `REDIS_PASSWORD`, `REDIS_DB` (0)
    /// - `REDIS_CONNECT_TIMEOUT_MS` - connection timeout (default: 5000)
    /// - `BASE_DAILY_QUOTA` - base daily allowance per IP (default: 5)
    /// - `SESSION_TTL_SECONDS` - session lifetime (default: 86400)
    /// - `MAINTENANCE_INTERVAL_SECONDS` - maintenance frequency (default: 300)
    /// - `QUOTA_UTC_OFFSET_MINUTES` - day boundary offset (default: local time)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let backend_flag = env::var("CACHE_BACKEND")
            .map(|v| v.eq_ignore_ascii_case("redis"))
            .unwrap_or(false);
        let enabled_flag = env::var("REDIS_ENABLED")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Self {
            redis_enabled: backend_flag || enabled_flag,
            redis_url: non_empty_var("REDIS_URL"),
            redis_host: non_empty_var("REDIS_HOST"),
            redis_port: parsed_var("REDIS_PORT").unwrap_or(defaults.redis_port),
            redis_password: non_empty_var("REDIS_PASSWORD"),
            redis_db: parsed_var("REDIS_DB").unwrap_or(defaults.redis_db),
            connect_timeout_ms: parsed_var("REDIS_CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connect_timeout_ms),
            base_daily_quota: parsed_var("BASE_DAILY_QUOTA").unwrap_or(defaults.base_daily_quota),
            session_ttl: parsed_var("SESSION_TTL_SECONDS").unwrap_or(defaults.session_ttl),
            maintenance_interval: parsed_var("MAINTENANCE_INTERVAL_SECONDS")
                .unwrap_or(defaults.maintenance_interval),
            quota_utc_offset_minutes: parsed_var("QUOTA_UTC_OFFSET_MINUTES"),
        }
    }

    /// Resolves which backend to build.
    ///
    /// Selecting Redis without a URL or host is a configuration error; it never
    /// degrades to the in-process backend.
    pub fn backend(&self) -> Result<BackendConfig> {
        if !self.redis_enabled {
            return Ok(BackendConfig::Memory);
        }

        let url = match (&self.redis_url, &self.redis_host) {
            (Some(url), _) => url.clone(),
            (None, Some(host)) => {
                let auth = self
                    .redis_password
                    .as_ref()
                    .map(|p| format!(":{}@", p))
                    .unwrap_or_default();
                format!("redis://{}{}:{}/{}", auth, host, self.redis_port, self.redis_db)
            }
            (None, None) => {
                return Err(CacheError::Config(
                    "redis backend selected but neither REDIS_URL nor REDIS_HOST is set"
                        .to_string(),
                ))
            }
        };

        Ok(BackendConfig::Redis {
            url,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_enabled: false,
            redis_url: None,
            redis_host: None,
            redis_port: 6379,
            redis_password: None,
            redis_db: 0,
            connect_timeout_ms: 5000,
            base_daily_quota: DEFAULT_BASE_QUOTA,
            session_ttl: DEFAULT_SESSION_TTL,
            maintenance_interval: 300,
            quota_utc_offset_minutes: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
