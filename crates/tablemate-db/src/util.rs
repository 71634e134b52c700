use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

/// SQLite's `datetime('now')` format. Lexicographic order matches time
/// order, so trailing-window filters compare strings directly.
const SQLITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cutoff timestamp for a trailing window, in the stored format.
pub fn cutoff_hours(hours: i64) -> String {
    (Utc::now() - Duration::hours(hours))
        .format(SQLITE_FORMAT)
        .to_string()
}

pub fn cutoff_days(days: i64) -> String {
    (Utc::now() - Duration::days(days))
        .format(SQLITE_FORMAT)
        .to_string()
}

/// Parse a stored id. A corrupt row logs and maps to the nil UUID instead
/// of failing the surrounding request.
pub fn parse_uuid(s: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid '{}': {}", s, e);
        Uuid::default()
    })
}

/// Parse a stored timestamp. SQLite writes "YYYY-MM-DD HH:MM:SS" without
/// a timezone; treat it as naive UTC.
pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, SQLITE_FORMAT).map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_timestamps_parse_as_utc() {
        let ts = parse_timestamp("2026-08-01 18:30:00");
        assert_eq!(ts.to_rfc3339(), "2026-08-01T18:30:00+00:00");
    }

    #[test]
    fn cutoff_is_lexicographically_comparable() {
        let recent = cutoff_hours(1);
        let older = cutoff_hours(5);
        assert!(older < recent);
    }
}
