//! Cache Store Module
//!
//! The key-value/hash contract shared by both backends. The backend is picked
//! once, at construction, and every call dispatches on that choice.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::entry::MAX_TTL_SECONDS;
use crate::cache::{CacheValue, ConnectionState, MemoryBackend, MemoryStats, RedisBackend};
use crate::config::{BackendConfig, Config};
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Unified key-value and hash store.
///
/// Cloning is cheap and shares the underlying backend, so one store can be
/// built per process and handed to every service that needs it.
#[derive(Clone)]
pub enum CacheStore {
    /// In-process fallback map
    Memory(MemoryBackend),
    /// Remote Redis server
    Redis(RedisBackend),
}

impl CacheStore {
    // == Constructors ==
    pub fn memory() -> Self {
        CacheStore::Memory(MemoryBackend::new())
    }

    pub fn redis(url: &str, connect_timeout: std::time::Duration) -> Result<Self> {
        Ok(CacheStore::Redis(RedisBackend::new(url, connect_timeout)?))
    }

    /// Builds the backend named by the configuration. Does not connect.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.backend()? {
            BackendConfig::Memory => Ok(Self::memory()),
            BackendConfig::Redis {
                url,
                connect_timeout,
            } => Self::redis(&url, connect_timeout),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            CacheStore::Memory(_) => "memory",
            CacheStore::Redis(_) => "redis",
        }
    }

    // == Connection ==
    /// Connects the backend. A no-op for the in-process map.
    pub async fn connect(&self) -> Result<()> {
        match self {
            CacheStore::Memory(_) => Ok(()),
            CacheStore::Redis(backend) => backend.connect().await,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self {
            CacheStore::Memory(_) => ConnectionState::Ready,
            CacheStore::Redis(backend) => backend.state(),
        }
    }

    // == Strings ==
    /// Stores `value` in its string form. `ttl = None` means no expiry; a zero
    /// or out-of-range TTL is rejected.
    pub async fn set(&self, key: &str, value: impl CacheValue, ttl: Option<u64>) -> Result<&'static str> {
        if matches!(ttl, Some(seconds) if seconds == 0 || seconds > MAX_TTL_SECONDS) {
            return Err(invalid_expire_time(key));
        }
        let value = value.into_cache_string();
        debug!(key = %key, ttl = ?ttl, "set");
        match self {
            CacheStore::Memory(backend) => backend.set(key, value, ttl).await?,
            CacheStore::Redis(backend) => backend.set(key, value, ttl).await?,
        }
        Ok("OK")
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            CacheStore::Memory(backend) => backend.get(key).await,
            CacheStore::Redis(backend) => backend.get(key).await,
        }
    }

    /// Returns the number of keys removed (0 or 1).
    pub async fn del(&self, key: &str) -> Result<u64> {
        debug!(key = %key, "del");
        match self {
            CacheStore::Memory(backend) => Ok(backend.del(key).await),
            CacheStore::Redis(backend) => backend.del(key).await,
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self {
            CacheStore::Memory(backend) => Ok(backend.exists(key).await),
            CacheStore::Redis(backend) => backend.exists(key).await,
        }
    }

    /// Sets a relative expiry. `false` if the key is absent. `seconds <= 0`
    /// deletes the key; an out-of-range expiry is rejected.
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        if seconds > 0 && seconds.unsigned_abs() > MAX_TTL_SECONDS {
            return Err(invalid_expire_time(key));
        }
        debug!(key = %key, seconds, "expire");
        match self {
            CacheStore::Memory(backend) => backend.expire(key, seconds).await,
            CacheStore::Redis(backend) => backend.expire(key, seconds).await,
        }
    }

    /// Seconds remaining, `-1` for no expiry, `-2` when the key is missing.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        match self {
            CacheStore::Memory(backend) => Ok(backend.ttl(key).await),
            CacheStore::Redis(backend) => backend.ttl(key).await,
        }
    }

    // == Counters ==
    /// Adds `delta` atomically. An absent key counts as 0 and gets no TTL.
    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let value = match self {
            CacheStore::Memory(backend) => backend.incr_by(key, delta).await?,
            CacheStore::Redis(backend) => backend.incr_by(key, delta).await?,
        };
        debug!(key = %key, delta, value, "incr_by");
        Ok(value)
    }

    pub async fn incr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, 1).await
    }

    pub async fn decr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, -1).await
    }

    // == Batches ==
    /// Writes each pair independently; there is no cross-key atomicity.
    pub async fn mset<K, V, I>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: CacheValue,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into_cache_string()))
            .collect();
        match self {
            CacheStore::Memory(backend) => {
                backend.mset(pairs).await;
                Ok(())
            }
            CacheStore::Redis(backend) => backend.mset(pairs).await,
        }
    }

    /// One value per key, in input order.
    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        match self {
            CacheStore::Memory(backend) => Ok(backend.mget(keys).await),
            CacheStore::Redis(backend) => backend.mget(keys).await,
        }
    }

    // == Hashes ==
    /// `1` if the field was created, `0` if it was overwritten.
    pub async fn hset(&self, key: &str, field: &str, value: impl CacheValue) -> Result<u64> {
        let value = value.into_cache_string();
        match self {
            CacheStore::Memory(backend) => backend.hset(key, field, value).await,
            CacheStore::Redis(backend) => backend.hset(key, field, value).await,
        }
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        match self {
            CacheStore::Memory(backend) => backend.hget(key, field).await,
            CacheStore::Redis(backend) => backend.hget(key, field).await,
        }
    }

    /// Every field of the hash; empty when the key is absent.
    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        match self {
            CacheStore::Memory(backend) => backend.hgetall(key).await,
            CacheStore::Redis(backend) => backend.hgetall(key).await,
        }
    }

    /// `1` if the field existed and was removed, else `0`.
    pub async fn hdel(&self, key: &str, field: &str) -> Result<u64> {
        match self {
            CacheStore::Memory(backend) => backend.hdel(key, field).await,
            CacheStore::Redis(backend) => backend.hdel(key, field).await,
        }
    }

    // == Key Scan ==
    /// Live keys matching `pattern`, where only `*` is a wildcard. Sorted.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        match self {
            CacheStore::Memory(backend) => backend.keys(pattern).await,
            CacheStore::Redis(backend) => backend.keys(pattern).await,
        }
    }

    // == Maintenance ==
    /// Sweeps expired entries out of the in-process map. Redis expires keys
    /// itself, so this returns 0 there.
    pub async fn purge_expired(&self) -> usize {
        match self {
            CacheStore::Memory(backend) => backend.purge_expired().await,
            CacheStore::Redis(_) => 0,
        }
    }

    /// Counters of the in-process map; `None` for Redis.
    pub async fn memory_stats(&self) -> Option<MemoryStats> {
        match self {
            CacheStore::Memory(backend) => Some(backend.stats().await),
            CacheStore::Redis(_) => None,
        }
    }
}

fn invalid_expire_time(key: &str) -> CacheError {
    CacheError::InvalidRequest(format!("invalid expire time for key '{}'", key))
}
