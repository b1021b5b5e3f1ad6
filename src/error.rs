//! Error types for the cache store and the services built on it
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend selected without enough information to reach it
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connecting failed, timed out, or the connection is marked failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error reported by the live Redis connection
    #[error("Backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// Counter operation on a value that is not an integer
    #[error("Value at key '{0}' is not an integer")]
    NotAnInteger(String),

    /// String operation on a hash, or hash operation on a string
    #[error("Wrong kind of value at key '{0}'")]
    WrongType(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Maps a Redis error for `key` onto the variant the in-process backend
    /// would have produced for the same mistake.
    pub(crate) fn from_redis(key: &str, err: redis::RedisError) -> Self {
        if err.code() == Some("WRONGTYPE") {
            return CacheError::WrongType(key.to_string());
        }
        if err.kind() == redis::ErrorKind::ResponseError {
            let message = err.to_string();
            if message.contains("not an integer") || message.contains("overflow") {
                return CacheError::NotAnInteger(key.to_string());
            }
            if message.contains("invalid expire time") {
                return CacheError::InvalidRequest(format!("invalid expire time for key '{}'", key));
            }
        }
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            return CacheError::Connection(err.to_string());
        }
        CacheError::Backend(err)
    }

    /// True when the error means the live connection can no longer be used.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, CacheError::Connection(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_an_integer_is_mapped() {
        let err = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "An error was signalled by the server",
            "value is not an integer or out of range".to_string(),
        ));
        assert!(matches!(
            CacheError::from_redis("counter", err),
            CacheError::NotAnInteger(key) if key == "counter"
        ));
    }

    #[test]
    fn test_counter_overflow_is_mapped() {
        let err = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "An error was signalled by the server",
            "increment or decrement would overflow".to_string(),
        ));
        assert!(matches!(
            CacheError::from_redis("big", err),
            CacheError::NotAnInteger(key) if key == "big"
        ));
    }

    #[test]
    fn test_invalid_expire_time_is_mapped() {
        let err = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "An error was signalled by the server",
            "invalid expire time in 'set' command".to_string(),
        ));
        assert!(matches!(
            CacheError::from_redis("k", err),
            CacheError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_display_messages() {
        let err = CacheError::Config("REDIS_URL missing".to_string());
        assert_eq!(err.to_string(), "Configuration error: REDIS_URL missing");
        assert!(CacheError::Connection("down".into()).is_connection_error());
        assert!(!CacheError::WrongType("k".into()).is_connection_error());
    }
}
