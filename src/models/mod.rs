pub mod release;
pub mod snapshot;
pub mod state;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Fixed-width UTC timestamp used for every persisted `created_at` /
/// `updated_at` column. The width matters: date-range queries compare these
/// lexicographically.
#[must_use]
pub fn fmt_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[must_use]
pub fn now_rfc3339() -> String {
    fmt_rfc3339(Utc::now())
}

#[must_use]
pub fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Metadata-provider dates are `YYYY-MM-DD`; an empty string means unknown.
#[must_use]
pub fn parse_provider_date(raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_date_empty_is_none() {
        assert_eq!(parse_provider_date(""), None);
        assert!(parse_provider_date("2024-03-01").is_some());
        assert_eq!(parse_provider_date("not-a-date"), None);
    }

    #[test]
    fn timestamps_round_trip() {
        let now = Utc::now();
        let parsed = parse_rfc3339(&fmt_rfc3339(now)).unwrap();
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
    }
}
