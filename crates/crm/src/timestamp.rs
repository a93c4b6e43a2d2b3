//! Chat history timestamps come in whatever format the CRM deployment uses.

use chrono::{DateTime, NaiveDateTime};

/// Naive layouts seen in chat exports, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

/// Bare numbers above this are already milliseconds (year 2001 in ms).
const EPOCH_MS_THRESHOLD: i64 = 1_000_000_000_000;

/// Parse a CRM timestamp into epoch milliseconds.
///
/// Accepts RFC 3339, the naive layouts above and bare epoch seconds or
/// milliseconds. Anything else maps to 0, which never passes a watermark.
#[must_use]
pub fn parse_timestamp_ms(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return match raw.parse::<i64>() {
            Ok(n) if n >= EPOCH_MS_THRESHOLD => n,
            Ok(n) => n.saturating_mul(1000),
            Err(_) => 0,
        };
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.timestamp_millis();
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map_or(0, |dt| dt.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("2024-05-01T10:00:00Z", 1_714_557_600_000)]
    #[case("2024-05-01T12:00:00+02:00", 1_714_557_600_000)]
    #[case("2024-05-01 10:00:00", 1_714_557_600_000)]
    #[case("01.05.2024 10:00:00", 1_714_557_600_000)]
    #[case("1714557600", 1_714_557_600_000)]
    #[case("1714557600000", 1_714_557_600_000)]
    #[case("  2024-05-01 10:00:00  ", 1_714_557_600_000)]
    fn parses_known_layouts(#[case] raw: &str, #[case] expected: i64) {
        assert_eq!(parse_timestamp_ms(raw), expected);
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("2024-13-01 10:00:00")]
    #[case("99999999999999999999999")]
    fn unparsable_is_zero(#[case] raw: &str) {
        assert_eq!(parse_timestamp_ms(raw), 0);
    }
}
