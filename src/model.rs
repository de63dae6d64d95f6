//! Domain types — message records, filters, paginated responses.

use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::provider::{ProviderMessage, StreamParams};

/// A single message as shown in the dashboard.
///
/// Built only by [`MessageRecord::from_provider`], which is the one
/// place that knows the provider's native field shapes. Never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Provider-assigned unique identifier.
    pub sid: String,
    /// Sender address (phone number, possibly channel-prefixed).
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Message body, absent for some message types.
    pub body: Option<String>,
    /// Provider-defined delivery status (`queued`, `delivered`, ...).
    pub status: String,
    /// `inbound` or an outbound variant.
    pub direction: String,
    /// Send time normalized to the display timezone, tz metadata
    /// stripped. Absent for messages the provider never sent.
    pub date_sent: Option<NaiveDateTime>,
}

impl MessageRecord {
    /// Transform a provider-native message into a dashboard record.
    ///
    /// The provider reports RFC 2822 timestamps in UTC; the configured
    /// offset is subtracted once here so everything downstream works in
    /// naive display-local time. An unparseable timestamp degrades to
    /// `None` rather than failing the whole page.
    pub fn from_provider(msg: &ProviderMessage, timezone_offset_hours: i64) -> Self {
        let date_sent = msg
            .date_sent
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
            .map(|dt| dt.naive_utc() - Duration::hours(timezone_offset_hours));

        Self {
            sid: msg.sid.clone(),
            from: msg.from.clone(),
            to: msg.to.clone(),
            body: msg.body.clone(),
            status: msg.status.clone(),
            direction: msg.direction.clone(),
            date_sent,
        }
    }
}

/// The set of optional predicates a dashboard query can apply.
///
/// A record matches iff every *present* predicate holds. Immutable once
/// built; lives for one request.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Exact message identifier. When set, search degenerates to a
    /// point lookup and the remaining predicates become a re-check.
    pub sid: Option<String>,
    /// Inclusive lower bound on `date_sent`.
    pub start_date: Option<NaiveDateTime>,
    /// Inclusive upper bound on `date_sent`.
    pub end_date: Option<NaiveDateTime>,
    /// Exact sender address.
    pub from: Option<String>,
    /// Exact recipient address.
    pub to: Option<String>,
    /// Substring the body must contain. Not expressible provider-side.
    pub body: Option<String>,
}

impl MessageFilter {
    /// Check a record against every present predicate (logical AND).
    ///
    /// Records without a timestamp skip the time bounds entirely.
    pub fn matches(&self, message: &MessageRecord) -> bool {
        if let Some(sid) = &self.sid {
            if message.sid != *sid {
                return false;
            }
        }

        if let Some(sent) = message.date_sent {
            if self.start_date.is_some_and(|bound| sent < bound) {
                return false;
            }
            if self.end_date.is_some_and(|bound| sent > bound) {
                return false;
            }
        }

        if let Some(from) = &self.from {
            if message.from != *from {
                return false;
            }
        }
        if let Some(to) = &self.to {
            if message.to != *to {
                return false;
            }
        }

        if let Some(pattern) = &self.body {
            match &message.body {
                Some(body) if body.contains(pattern) => {}
                _ => return false,
            }
        }

        true
    }

    /// Project the predicates the provider's query API understands.
    ///
    /// The time bounds are a superset pre-filter (the provider only has
    /// whole-day granularity), so [`MessageFilter::matches`] must still
    /// be re-checked on everything the stream yields.
    pub fn to_stream_params(&self, page_size: usize, limit: usize) -> StreamParams {
        StreamParams {
            date_sent_after: self.start_date,
            date_sent_before: self.end_date,
            from: self.from.clone(),
            to: self.to.clone(),
            page_size,
            limit,
        }
    }
}

/// One page of results plus the aggregates the dashboard renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult {
    pub messages: Vec<MessageRecord>,
    pub page: i64,
    pub per_page: usize,
    /// Matching records seen before the fetch stopped — an estimate for
    /// large result sets, not a corpus-wide count.
    pub total: i64,
    /// `ceil(total / per_page)`, floored at the requested page so the
    /// UI never reports fewer pages than the one being viewed.
    pub total_pages: i64,
    /// True iff this page came back completely full.
    pub has_more: bool,
    /// Distinct counterpart addresses across all matching records.
    pub unique_users: usize,
    /// Set when the provider fetch failed; counts are zeroed then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaginatedResult {
    /// The well-formed empty payload returned when a fetch fails, so
    /// the UI can always render a consistent empty state.
    pub fn failed(page: i64, per_page: usize, error: String) -> Self {
        Self {
            messages: Vec::new(),
            page,
            per_page,
            total: 0,
            total_pages: 0,
            has_more: false,
            unique_users: 0,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sid: &str, from: &str, to: &str, body: Option<&str>) -> MessageRecord {
        MessageRecord {
            sid: sid.into(),
            from: from.into(),
            to: to.into(),
            body: body.map(String::from),
            status: "delivered".into(),
            direction: "outbound-api".into(),
            date_sent: crate::dates::parse_datetime(Some("2024-03-05T14:30")),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = MessageFilter::default();
        assert!(filter.matches(&record("SM1", "+111", "+222", None)));
    }

    #[test]
    fn all_present_predicates_must_hold() {
        let filter = MessageFilter {
            from: Some("+111".into()),
            to: Some("+222".into()),
            body: Some("hola".into()),
            ..Default::default()
        };
        assert!(filter.matches(&record("SM1", "+111", "+222", Some("hola mundo"))));
        assert!(!filter.matches(&record("SM1", "+111", "+999", Some("hola mundo"))));
        assert!(!filter.matches(&record("SM1", "+111", "+222", Some("adios"))));
    }

    #[test]
    fn adding_a_predicate_never_widens_the_match_set() {
        let records = [
            record("SM1", "+111", "+222", Some("hola")),
            record("SM2", "+111", "+333", Some("hola")),
            record("SM3", "+444", "+222", Some("adios")),
        ];
        let loose = MessageFilter {
            from: Some("+111".into()),
            ..Default::default()
        };
        let tight = MessageFilter {
            from: Some("+111".into()),
            body: Some("hola".into()),
            to: Some("+222".into()),
            ..Default::default()
        };
        for r in &records {
            if tight.matches(r) {
                assert!(loose.matches(r));
            }
        }
    }

    #[test]
    fn time_bounds_are_inclusive() {
        let sent = crate::dates::parse_datetime(Some("2024-03-05T14:30"));
        let filter = MessageFilter {
            start_date: sent,
            end_date: sent,
            ..Default::default()
        };
        assert!(filter.matches(&record("SM1", "+1", "+2", None)));
    }

    #[test]
    fn records_without_timestamp_skip_time_bounds() {
        let mut r = record("SM1", "+1", "+2", None);
        r.date_sent = None;
        let filter = MessageFilter {
            start_date: crate::dates::parse_datetime(Some("2030-01-01")),
            ..Default::default()
        };
        assert!(filter.matches(&r));
    }

    #[test]
    fn body_filter_never_matches_absent_body() {
        let filter = MessageFilter {
            body: Some("x".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&record("SM1", "+1", "+2", None)));
    }

    #[test]
    fn stream_params_carry_only_provider_expressible_predicates() {
        let filter = MessageFilter {
            sid: Some("SM1".into()),
            from: Some("+111".into()),
            body: Some("hola".into()),
            start_date: crate::dates::parse_datetime(Some("2024-03-01")),
            ..Default::default()
        };
        let params = filter.to_stream_params(100, 1050);
        assert_eq!(params.from.as_deref(), Some("+111"));
        assert_eq!(params.date_sent_after, filter.start_date);
        assert!(params.date_sent_before.is_none());
        assert_eq!(params.page_size, 100);
        assert_eq!(params.limit, 1050);
    }

    #[test]
    fn provider_transform_shifts_timezone_and_drops_offset() {
        let msg = ProviderMessage {
            sid: "SM1".into(),
            from: "+111".into(),
            to: "+222".into(),
            body: Some("hi".into()),
            status: "sent".into(),
            direction: "outbound-api".into(),
            date_sent: Some("Tue, 05 Mar 2024 20:30:00 +0000".into()),
        };
        let record = MessageRecord::from_provider(&msg, 6);
        assert_eq!(
            record.date_sent,
            crate::dates::parse_datetime(Some("2024-03-05T14:30"))
        );
    }

    #[test]
    fn provider_transform_tolerates_bad_timestamp() {
        let msg = ProviderMessage {
            sid: "SM1".into(),
            from: "+111".into(),
            to: "+222".into(),
            body: None,
            status: "queued".into(),
            direction: "outbound-api".into(),
            date_sent: Some("never".into()),
        };
        assert!(MessageRecord::from_provider(&msg, 6).date_sent.is_none());
    }
}
