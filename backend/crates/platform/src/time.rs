//! Fixed-offset timestamps
//!
//! Signing times and log records are always expressed in a fixed UTC offset
//! (Moscow time, UTC+3) regardless of the host timezone.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// UTC+03:00
pub const MOSCOW_OFFSET_SECS: i32 = 3 * 3600;

/// `2024-01-15T14:30:25+03:00`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Current time shifted into the given offset
///
/// Out-of-range offsets fall back to UTC.
pub fn now_with_offset(offset_secs: i32) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(offset_secs).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset)
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS±HH:MM`
pub fn format_timestamp(at: &DateTime<FixedOffset>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current Moscow time, formatted
pub fn moscow_timestamp() -> String {
    format_timestamp(&now_with_offset(MOSCOW_OFFSET_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_fixed_instant() {
        let offset = FixedOffset::east_opt(MOSCOW_OFFSET_SECS).unwrap();
        let at = offset.with_ymd_and_hms(2024, 1, 15, 14, 30, 25).unwrap();
        assert_eq!(format_timestamp(&at), "2024-01-15T14:30:25+03:00");
    }

    #[test]
    fn test_moscow_timestamp_shape() {
        let ts = moscow_timestamp();
        assert_eq!(ts.len(), 25);
        assert!(ts.ends_with("+03:00"));
        assert_eq!(&ts[10..11], "T");
    }

    #[test]
    fn test_invalid_offset_falls_back_to_utc() {
        let at = now_with_offset(48 * 3600);
        assert_eq!(at.offset().local_minus_utc(), 0);
    }
}
