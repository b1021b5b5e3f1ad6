//! Cache Entry Module
//!
//! Defines the structure for individual entries of the in-process backend.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{CacheError, Result};

/// Largest relative expiry, in seconds, whose millisecond form still fits a
/// signed 64-bit timestamp. Redis rejects anything above it.
pub const MAX_TTL_SECONDS: u64 = i64::MAX as u64 / 1000;

// == Entry Kind ==
/// What the stored string represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Plain string value
    String,
    /// Serialized field→value mapping
    Hash,
}

// == Cache Entry ==
/// Represents a single cache entry with value and absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: String,
    pub kind: EntryKind,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new string entry with optional TTL in seconds.
    ///
    /// Fails with `InvalidRequest` when the absolute expiry would not fit a
    /// millisecond timestamp.
    pub fn new(value: String, ttl_seconds: Option<u64>) -> Result<Self> {
        let expires_at = ttl_seconds.map(expiry_after).transpose()?;

        Ok(Self {
            value,
            kind: EntryKind::String,
            expires_at,
        })
    }

    /// Creates a string entry that never expires.
    pub fn persistent(value: String) -> Self {
        Self {
            value,
            kind: EntryKind::String,
            expires_at: None,
        }
    }

    /// Creates a hash entry holding an already serialized mapping.
    pub fn hash(serialized: String) -> Self {
        Self {
            value: serialized,
            kind: EntryKind::Hash,
            expires_at: None,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired (TTL elapsed)
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }

    /// Returns remaining TTL in whole seconds, rounded to nearest like Redis `TTL`.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.ttl_remaining_ms().map(|ms| (ms + 500) / 1000)
    }

    /// Replaces the expiry with one `seconds` from now. On overflow the entry
    /// keeps its previous expiry.
    pub fn expire_in(&mut self, seconds: u64) -> Result<()> {
        self.expires_at = Some(expiry_after(seconds)?);
        Ok(())
    }
}

/// Absolute expiry `seconds` from now, in Unix milliseconds.
fn expiry_after(seconds: u64) -> Result<u64> {
    seconds
        .checked_mul(1000)
        .and_then(|ms| ms.checked_add(current_timestamp_ms()))
        .filter(|at| *at <= i64::MAX as u64)
        .ok_or_else(|| CacheError::InvalidRequest(format!("invalid expire time: {}s", seconds)))
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
