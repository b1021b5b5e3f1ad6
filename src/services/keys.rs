//! Cache key layout shared with other subsystems.
//!
//! ```text
//! usage:daily:{YYYY-MM-DD}:{ip}          → daily usage counter
//! usage:bonus:{type}:{YYYY-MM-DD}:{ip}   → bonus pool amount
//! session:{session_id}                   → Session JSON
//! ip_session:{ip}                        → session id
//! ```

use chrono::NaiveDate;

use crate::models::BonusType;

/// Matches every session payload key.
pub const SESSION_PATTERN: &str = "session:*";

/// Matches every IP → session pointer key.
pub const IP_SESSION_PATTERN: &str = "ip_session:*";

const SESSION_PREFIX: &str = "session:";

pub fn daily_usage_key(date: NaiveDate, ip: &str) -> String {
    format!("usage:daily:{}:{}", date.format("%Y-%m-%d"), ip)
}

pub fn bonus_quota_key(bonus_type: BonusType, date: NaiveDate, ip: &str) -> String {
    format!(
        "usage:bonus:{}:{}:{}",
        bonus_type.as_str(),
        date.format("%Y-%m-%d"),
        ip
    )
}

pub fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}

pub fn ip_session_key(ip: &str) -> String {
    format!("ip_session:{}", ip)
}

/// Extracts the session id from a `session:` key.
pub fn session_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(SESSION_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert_eq!(
            daily_usage_key(date, "203.0.113.5"),
            "usage:daily:2024-03-09:203.0.113.5"
        );
        assert_eq!(
            bonus_quota_key(BonusType::Payment, date, "203.0.113.5"),
            "usage:bonus:payment:2024-03-09:203.0.113.5"
        );
        assert_eq!(session_key("s1"), "session:s1");
        assert_eq!(ip_session_key("10.0.0.1"), "ip_session:10.0.0.1");
    }

    #[test]
    fn test_session_id_from_key() {
        assert_eq!(session_id_from_key("session:abc"), Some("abc"));
        assert_eq!(session_id_from_key("ip_session:abc"), None);
    }
}
