//! Lenient parsing for user-supplied date filters.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a date filter as entered in the dashboard.
///
/// Accepts `YYYY-MM-DDTHH:MM`, then `YYYY-MM-DD` (midnight). Anything
/// else — including an absent or empty string — is `None`, never an
/// error: an unparseable bound just means "no filter on that bound".
/// No timezone is attached here.
pub fn parse_datetime(input: Option<&str>) -> Option<NaiveDateTime> {
    let raw = input?;
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_datetime_with_minutes() {
        let parsed = parse_datetime(Some("2024-03-05T14:30")).unwrap();
        assert_eq!(parsed.to_string(), "2024-03-05 14:30:00");
    }

    #[test]
    fn parses_date_only_as_midnight() {
        let parsed = parse_datetime(Some("2024-03-05")).unwrap();
        assert_eq!(parsed.to_string(), "2024-03-05 00:00:00");
    }

    #[test]
    fn garbage_is_absent() {
        assert!(parse_datetime(Some("not-a-date")).is_none());
        assert!(parse_datetime(Some("")).is_none());
        assert!(parse_datetime(None).is_none());
    }

    #[test]
    fn rejects_trailing_text() {
        assert!(parse_datetime(Some("2024-03-05T14:30:59Z")).is_none());
    }
}
