//! Timestamp parsing for user input and loosely-typed store rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parse a timestamp as RFC 3339, or as a naive date-time (taken as UTC).
///
/// Accepts `YYYY-MM-DD HH:mm:ss` (space instead of `T`), the minute-precision
/// form produced by date-time pickers, and a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let isoish = if trimmed.contains('T') {
        trimmed.to_string()
    } else {
        trimmed.replacen(' ', "T", 1)
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&isoish) {
        return Some(dt.with_timezone(&Utc));
    }
    // Postgres renders offsets as "+00" without minutes.
    if let Ok(dt) = DateTime::parse_from_str(&isoish, "%Y-%m-%dT%H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&isoish, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
