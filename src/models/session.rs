//! Session models
//!
//! The session payload cached under `session:<id>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status recorded on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// Usage figures captured when the session was last written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub used: i64,
    pub total: i64,
    pub remaining: i64,
}

// == Session ==
/// A server-side session bound to one client IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub ip: String,
    pub status: SessionStatus,
    pub quota: QuotaSnapshot,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Creates an active session stamped with the current time.
    pub fn new(id: impl Into<String>, ip: impl Into<String>, quota: QuotaSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            ip: ip.into(),
            status: SessionStatus::Active,
            quota,
            created_at: now,
            last_active_at: now,
        }
    }
}

/// What is known about the session bound to an IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpSessionStats {
    pub has_active_session: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Seconds, or -1 when the session has no expiry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ttl: Option<i64>,
}

impl IpSessionStats {
    pub fn none() -> Self {
        Self {
            has_active_session: false,
            session_id: None,
            remaining_ttl: None,
        }
    }
}
