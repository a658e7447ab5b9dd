use chrono::{Local, TimeZone, Utc};

/// Anything above this is already milliseconds (year 2001 in ms, year 33658 in s).
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Normalize a timestamp that may be epoch seconds or milliseconds to milliseconds.
pub fn normalize_epoch_ms(value: i64) -> i64 {
    if value > MILLIS_THRESHOLD {
        value
    } else {
        value.saturating_mul(1000)
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a seconds-or-milliseconds timestamp in local time for listings.
pub fn format_timestamp(value: i64) -> String {
    match Local.timestamp_millis_opt(normalize_epoch_ms(value)).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_are_scaled() {
        assert_eq!(normalize_epoch_ms(1_700_000_000), 1_700_000_000_000);
    }

    #[test]
    fn test_millis_are_kept() {
        assert_eq!(normalize_epoch_ms(1_700_000_000_123), 1_700_000_000_123);
    }
}
