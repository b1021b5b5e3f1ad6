//! Key pattern matching.
//!
//! Only `*` is a wildcard (zero or more of any character). Every other
//! character, regex and Redis glob metacharacters included, matches itself.

use regex::Regex;

use crate::error::{CacheError, Result};

/// Translates a key pattern into an anchored regular expression.
///
/// The escaped pattern is always valid syntax, but a long enough one can
/// exceed the regex size limit and is rejected as `InvalidRequest`.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    Regex::new(&format!("(?s)^{}$", body))
        .map_err(|e| CacheError::InvalidRequest(format!("unusable key pattern: {}", e)))
}

/// Escapes the Redis glob syntax other than `*` so that `SCAN MATCH`
/// interprets the pattern the same way as [`glob_to_regex`].
pub fn escape_redis_glob(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_any_run() {
        let re = glob_to_regex("usage:daily:*").unwrap();
        assert!(re.is_match("usage:daily:2024-01-01:1.2.3.4"));
        assert!(re.is_match("usage:daily:"));
        assert!(!re.is_match("xusage:daily:1"));
    }

    #[test]
    fn test_pattern_is_anchored() {
        let re = glob_to_regex("session:*").unwrap();
        assert!(re.is_match("session:abc"));
        assert!(!re.is_match("ip_session:10.0.0.1"));
    }

    #[test]
    fn test_inner_star() {
        let re = glob_to_regex("prefix:*:suffix").unwrap();
        assert!(re.is_match("prefix:a:suffix"));
        assert!(re.is_match("prefix::suffix"));
        assert!(re.is_match("prefix:a:b:suffix"));
        assert!(!re.is_match("prefix:a:suffix2"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let re = glob_to_regex("ip:10.0.0.1").unwrap();
        assert!(re.is_match("ip:10.0.0.1"));
        assert!(!re.is_match("ip:10x0y0z1"));

        let re = glob_to_regex("a(b)+c?[d]").unwrap();
        assert!(re.is_match("a(b)+c?[d]"));
        assert!(!re.is_match("abbc"));
    }

    #[test]
    fn test_case_sensitive() {
        let re = glob_to_regex("Session:*").unwrap();
        assert!(!re.is_match("session:1"));
    }

    #[test]
    fn test_oversized_pattern_is_an_error() {
        let pattern = "(ab)*".repeat(500_000);
        assert!(matches!(
            glob_to_regex(&pattern),
            Err(CacheError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_escape_redis_glob() {
        assert_eq!(escape_redis_glob("session:*"), "session:*");
        assert_eq!(escape_redis_glob("a?b[c]\\"), "a\\?b\\[c\\]\\\\");
    }
}
