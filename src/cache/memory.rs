//! In-process backend
//!
//! A `HashMap` behind a single async `RwLock`. Every mutation runs under the
//! write lock, which makes per-key read-modify-write operations atomic.
//! Expiry is an absolute timestamp checked lazily whenever a key is touched.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::entry::{CacheEntry, EntryKind};
use crate::cache::glob::glob_to_regex;
use crate::cache::MemoryStats;
use crate::error::{CacheError, Result};

type HashFields = HashMap<String, String>;

#[derive(Debug, Default)]
struct MemoryInner {
    entries: HashMap<String, CacheEntry>,
    stats: MemoryStats,
}

impl MemoryInner {
    /// Returns the entry if it exists and is live, evicting it if expired.
    fn live_entry(&mut self, key: &str) -> Option<&mut CacheEntry> {
        let expired = self.entries.get(key).map(CacheEntry::is_expired)?;
        if expired {
            self.entries.remove(key);
            self.stats.record_expired(1);
            debug!(key = %key, "evicted expired entry");
            return None;
        }
        self.entries.get_mut(key)
    }

    fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - self.entries.len();
        self.stats.record_expired(removed);
        removed
    }
}

fn read_fields(key: &str, entry: &CacheEntry) -> Result<HashFields> {
    if entry.kind != EntryKind::Hash {
        return Err(CacheError::WrongType(key.to_string()));
    }
    Ok(serde_json::from_str(&entry.value)?)
}

// == Memory Backend ==
/// In-process fallback backend. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `InvalidRequest` when `ttl` is too large to schedule; the
    /// previous value is left in place.
    pub async fn set(&self, key: &str, value: String, ttl: Option<u64>) -> Result<()> {
        let entry = CacheEntry::new(value, ttl)?;
        let mut inner = self.inner.write().await;
        inner.entries.insert(key.to_string(), entry);
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.write().await;
        let value = match inner.live_entry(key) {
            Some(entry) if entry.kind == EntryKind::Hash => {
                return Err(CacheError::WrongType(key.to_string()))
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        };
        inner.stats.record_read(value.is_some());
        Ok(value)
    }

    pub async fn del(&self, key: &str) -> u64 {
        let mut inner = self.inner.write().await;
        if inner.live_entry(key).is_none() {
            return 0;
        }
        inner.entries.remove(key);
        1
    }

    pub async fn exists(&self, key: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.live_entry(key).is_some()
    }

    /// Sets a relative expiry. Non-positive `seconds` deletes the key.
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.live_entry(key) else {
            return Ok(false);
        };
        if seconds <= 0 {
            inner.entries.remove(key);
        } else {
            entry.expire_in(seconds.unsigned_abs())?;
        }
        Ok(true)
    }

    /// `-2` when missing, `-1` when no expiry is set, else seconds remaining.
    pub async fn ttl(&self, key: &str) -> i64 {
        let mut inner = self.inner.write().await;
        match inner.live_entry(key) {
            None => -2,
            Some(entry) => entry.ttl_remaining().map(|s| s as i64).unwrap_or(-1),
        }
    }

    /// Adds `delta` to the integer at `key`. A live key keeps its TTL; an
    /// absent key starts from 0 without a TTL.
    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut inner = self.inner.write().await;
        match inner.live_entry(key) {
            Some(entry) => {
                if entry.kind != EntryKind::String {
                    return Err(CacheError::WrongType(key.to_string()));
                }
                let current: i64 = entry
                    .value
                    .parse()
                    .map_err(|_| CacheError::NotAnInteger(key.to_string()))?;
                let next = current
                    .checked_add(delta)
                    .ok_or_else(|| CacheError::NotAnInteger(key.to_string()))?;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                inner
                    .entries
                    .insert(key.to_string(), CacheEntry::persistent(delta.to_string()));
                Ok(delta)
            }
        }
    }

    /// Writes every pair without expiry, replacing any previous value.
    pub async fn mset(&self, pairs: Vec<(String, String)>) {
        let mut inner = self.inner.write().await;
        for (key, value) in pairs {
            inner.entries.insert(key, CacheEntry::persistent(value));
        }
    }

    /// Values in input order; hashes read as missing, like Redis `MGET`.
    pub async fn mget(&self, keys: &[String]) -> Vec<Option<String>> {
        let mut inner = self.inner.write().await;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match inner.live_entry(key) {
                Some(entry) if entry.kind == EntryKind::String => Some(entry.value.clone()),
                _ => None,
            };
            inner.stats.record_read(value.is_some());
            values.push(value);
        }
        values
    }

    pub async fn hset(&self, key: &str, field: &str, value: String) -> Result<u64> {
        let mut inner = self.inner.write().await;
        match inner.live_entry(key) {
            Some(entry) => {
                let mut fields = read_fields(key, entry)?;
                let created = fields.insert(field.to_string(), value).is_none();
                entry.value = serde_json::to_string(&fields)?;
                Ok(u64::from(created))
            }
            None => {
                let fields = HashFields::from([(field.to_string(), value)]);
                let entry = CacheEntry::hash(serde_json::to_string(&fields)?);
                inner.entries.insert(key.to_string(), entry);
                Ok(1)
            }
        }
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut inner = self.inner.write().await;
        let value = match inner.live_entry(key) {
            Some(entry) => read_fields(key, entry)?.remove(field),
            None => None,
        };
        inner.stats.record_read(value.is_some());
        Ok(value)
    }

    pub async fn hgetall(&self, key: &str) -> Result<HashFields> {
        let mut inner = self.inner.write().await;
        match inner.live_entry(key) {
            Some(entry) => read_fields(key, entry),
            None => Ok(HashFields::new()),
        }
    }

    /// Removes a field; the key goes away with its last field.
    pub async fn hdel(&self, key: &str, field: &str) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.live_entry(key) else {
            return Ok(0);
        };
        let mut fields = read_fields(key, entry)?;
        if fields.remove(field).is_none() {
            return Ok(0);
        }
        if fields.is_empty() {
            inner.entries.remove(key);
        } else {
            entry.value = serde_json::to_string(&fields)?;
        }
        Ok(1)
    }

    /// Live keys matching `pattern`, sorted.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let mut inner = self.inner.write().await;
        inner.purge_expired();
        let mut keys: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| matcher.is_match(key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        self.inner.write().await.purge_expired()
    }

    pub async fn stats(&self) -> MemoryStats {
        let inner = self.inner.read().await;
        let mut stats = inner.stats.clone();
        stats.total_entries = inner.entries.len();
        stats
    }
}
