//! Platform-aware clock for file descriptors.
//!
//! `std::time::SystemTime` is unavailable on `wasm32-unknown-unknown`, so the
//! browser build reads `Date.now()` instead of `chrono::Utc::now()`.

/// Current Unix time in milliseconds, the unit of `File.lastModified`.
pub fn now_millis() -> i64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now() as i64
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Format a millisecond timestamp as RFC 3339, or `None` if out of range.
pub fn format_millis(millis: i64) -> Option<String> {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_reasonable() {
        let ts = now_millis();
        // After 2024-01-01, before 2100-01-01
        assert!(ts > 1_704_067_200_000, "Timestamp {} is too old", ts);
        assert!(ts < 4_102_444_800_000, "Timestamp {} is too far in future", ts);
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(
            format_millis(0).as_deref(),
            Some("1970-01-01T00:00:00+00:00")
        );
        assert!(format_millis(i64::MAX).is_none());
    }
}
