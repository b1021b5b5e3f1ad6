//! Conversion of caller values into the stored string form.
//!
//! Every value is stored as a string. Numbers and booleans use their display
//! form, a missing value (`None`, JSON `null`) is stored as `"null"`, and a
//! JSON string is stored without quotes.

/// A value that can be written to the cache.
pub trait CacheValue {
    fn into_cache_string(self) -> String;
}

impl CacheValue for String {
    fn into_cache_string(self) -> String {
        self
    }
}

impl CacheValue for &str {
    fn into_cache_string(self) -> String {
        self.to_string()
    }
}

impl CacheValue for &String {
    fn into_cache_string(self) -> String {
        self.clone()
    }
}

macro_rules! display_cache_value {
    ($($t:ty),*) => {
        $(
            impl CacheValue for $t {
                fn into_cache_string(self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_cache_value!(bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl<T: CacheValue> CacheValue for Option<T> {
    fn into_cache_string(self) -> String {
        match self {
            Some(value) => value.into_cache_string(),
            None => "null".to_string(),
        }
    }
}

impl CacheValue for serde_json::Value {
    fn into_cache_string(self) -> String {
        match self {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_use_display_form() {
        assert_eq!(42i64.into_cache_string(), "42");
        assert_eq!((-7i32).into_cache_string(), "-7");
        assert_eq!(1.5f64.into_cache_string(), "1.5");
        assert_eq!(true.into_cache_string(), "true");
        assert_eq!("plain".into_cache_string(), "plain");
    }

    #[test]
    fn test_missing_values_become_null() {
        assert_eq!(None::<i64>.into_cache_string(), "null");
        assert_eq!(Some(3u8).into_cache_string(), "3");
        assert_eq!(serde_json::Value::Null.into_cache_string(), "null");
    }

    #[test]
    fn test_json_values() {
        assert_eq!(json!("text").into_cache_string(), "text");
        assert_eq!(json!({"a": 1}).into_cache_string(), r#"{"a":1}"#);
        assert_eq!(json!(false).into_cache_string(), "false");
    }
}
