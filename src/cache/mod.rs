//! Cache Module
//!
//! One key-value/hash contract over two interchangeable backends: a Redis
//! server or an in-process map with lazy TTL expiry.

mod connection;
mod entry;
mod glob;
mod memory;
mod redis;
mod stats;
mod store;
mod value;


// Re-export public types
pub use connection::ConnectionState;
pub use entry::{CacheEntry, EntryKind, MAX_TTL_SECONDS};
pub use glob::glob_to_regex;
pub use memory::MemoryBackend;
pub use self::redis::RedisBackend;
pub use stats::MemoryStats;
pub use store::CacheStore;
pub use value::CacheValue;
