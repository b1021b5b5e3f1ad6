//! Domain services built on the cache store
//!
//! - Usage quota: per-IP daily counters plus day-scoped bonus pools
//! - Session cache: session payloads with an IP → session reverse index

mod clock;
pub mod keys;
mod session;
mod usage_quota;

pub use clock::DayClock;
pub use session::{SessionCacheService, DEFAULT_SESSION_TTL};
pub use usage_quota::{UsageQuotaService, DEFAULT_BASE_QUOTA};
