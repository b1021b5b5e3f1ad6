//! Data models for the quota and session services
//!
//! Serializable types exchanged with callers and stored in the cache.

mod quota;
mod session;

pub use quota::{BonusType, TotalQuota, UsageStatus};
pub use session::{IpSessionStats, QuotaSnapshot, Session, SessionStatus};
