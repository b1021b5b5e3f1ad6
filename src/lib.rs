//! Quota Cache - dual-backend cache with usage quotas and a session index
//!
//! A key-value/hash store that behaves the same on Redis or an in-process
//! map, plus per-IP daily usage quotas and a session ↔ IP index built on it.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod tasks;

pub use cache::CacheStore;
pub use config::Config;
pub use error::{CacheError, Result};
pub use services::{SessionCacheService, UsageQuotaService};
pub use tasks::spawn_maintenance_task;
