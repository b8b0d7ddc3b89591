//! Timestamp utilities
//!
//! Timestamps are stored as RFC 3339 UTC strings with millisecond precision
//! and a `Z` suffix. The fixed width keeps lexicographic order equal to
//! chronological order, which the overlap and range queries rely on.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp
pub fn from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", value, e)))
}

/// Whole days elapsed between two instants (floor, never negative)
pub fn whole_days_between(start: &DateTime<Utc>, end: &DateTime<Utc>) -> i64 {
    let secs = (*end - *start).num_seconds();
    if secs <= 0 {
        0
    } else {
        secs / 86_400
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_db_format_round_trips() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let stored = to_db(&ts);
        assert_eq!(stored, "2024-03-05T14:30:00.000Z");
        assert_eq!(from_db(&stored).unwrap(), ts);
    }

    #[test]
    fn test_db_format_orders_lexicographically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 9, 23, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap();
        assert!(to_db(&early) < to_db(&late));
    }

    #[test]
    fn test_from_db_rejects_garbage() {
        assert!(from_db("yesterday").is_err());
    }

    #[test]
    fn test_whole_days_floor() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(whole_days_between(&start, &(start + Duration::hours(47))), 1);
        assert_eq!(whole_days_between(&start, &(start + Duration::hours(48))), 2);
        assert_eq!(whole_days_between(&start, &(start - Duration::hours(5))), 0);
    }
}
