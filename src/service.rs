//! Message search — reconciles the provider's forward-only stream with
//! the page/offset semantics the dashboard expects.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tracing::error;

use crate::model::{MessageFilter, MessageRecord, PaginatedResult};
use crate::provider::MessageSource;

/// Extra records requested beyond the page boundary, to tolerate the
/// provider's pre-filter under- or over-matching the full predicate set.
const STREAM_SAFETY_MARGIN: usize = 1000;

/// Pagination and filtering over a remote message source.
pub struct MessageService {
    source: Arc<dyn MessageSource>,
    timezone_offset_hours: i64,
    provider_page_size: usize,
}

impl MessageService {
    pub fn new(
        source: Arc<dyn MessageSource>,
        timezone_offset_hours: i64,
        provider_page_size: usize,
    ) -> Self {
        Self {
            source,
            timezone_offset_hours,
            provider_page_size,
        }
    }

    /// Resolve one page of matching messages.
    ///
    /// A filter with a sid pinned short-circuits to a point lookup;
    /// anything else streams from the provider. Provider failures come
    /// back as a well-formed empty page with the error string set —
    /// they never propagate.
    pub async fn page_messages(
        &self,
        filter: &MessageFilter,
        page: i64,
        per_page: usize,
    ) -> PaginatedResult {
        match &filter.sid {
            Some(sid) => self.point_lookup(sid, filter, per_page).await,
            None => self.stream_page(filter, page, per_page).await,
        }
    }

    /// Fetch exactly one record by identifier and re-check the filter.
    async fn point_lookup(&self, sid: &str, filter: &MessageFilter, per_page: usize) -> PaginatedResult {
        let found = match self.source.fetch_message(sid).await {
            Ok(found) => found,
            Err(e) => {
                error!(sid, error = %e, "point lookup failed");
                return PaginatedResult::failed(1, per_page, e.to_string());
            }
        };

        let messages: Vec<MessageRecord> = found
            .map(|raw| MessageRecord::from_provider(&raw, self.timezone_offset_hours))
            .filter(|record| filter.matches(record))
            .into_iter()
            .collect();

        let unique_users = count_unique_users(&messages, filter);
        PaginatedResult {
            total: messages.len() as i64,
            messages,
            page: 1,
            per_page,
            total_pages: 1,
            has_more: false,
            unique_users,
            error: None,
        }
    }

    /// Stream from the provider, re-check the full filter client-side,
    /// and slice the matching sequence into the requested page.
    async fn stream_page(&self, filter: &MessageFilter, page: i64, per_page: usize) -> PaginatedResult {
        let target_start = (page - 1) * per_page as i64;
        let target_end = target_start + per_page as i64;
        let limit = target_end.max(0) as usize + STREAM_SAFETY_MARGIN;

        let params = filter.to_stream_params(self.provider_page_size, limit);
        let mut stream = self.source.stream_messages(params);

        let mut results: Vec<MessageRecord> = Vec::new();
        // Every matching record, page or not, feeds the counterpart count.
        let mut all_matching: Vec<MessageRecord> = Vec::new();
        let mut processed: i64 = 0;

        while let Some(item) = stream.next().await {
            let raw = match item {
                Ok(raw) => raw,
                Err(e) => {
                    error!(error = %e, "message stream failed");
                    return PaginatedResult::failed(page, per_page, e.to_string());
                }
            };

            let record = MessageRecord::from_provider(&raw, self.timezone_offset_hours);
            if !filter.matches(&record) {
                continue;
            }

            if processed >= target_start && results.len() < per_page {
                results.push(record.clone());
            }
            all_matching.push(record);
            processed += 1;
        }

        // The stream ends at the safety-margin limit, so for very large
        // matching sets `processed` and the counterpart aggregate are
        // truncated there — an accepted approximation.

        let unique_users = count_unique_users(&all_matching, filter);
        let total_pages = if per_page > 0 {
            ((processed + per_page as i64 - 1) / per_page as i64).max(page)
        } else {
            page
        };

        PaginatedResult {
            has_more: results.len() == per_page && per_page > 0,
            messages: results,
            page,
            per_page,
            total: processed,
            total_pages,
            unique_users,
            error: None,
        }
    }
}

/// Count distinct counterpart addresses across the matching set.
///
/// The pinned sender/recipient from the filter is treated as the
/// service's own address. With nothing pinned, the single most frequent
/// address across both fields is assumed to be the service (ties broken
/// by first encounter). Every other distinct address, from either
/// field, counts once.
fn count_unique_users(messages: &[MessageRecord], filter: &MessageFilter) -> usize {
    if messages.is_empty() {
        return 0;
    }

    let mut service_addresses: HashSet<&str> = HashSet::new();
    if let Some(from) = &filter.from {
        service_addresses.insert(from);
    }
    if let Some(to) = &filter.to {
        service_addresses.insert(to);
    }

    if service_addresses.is_empty() {
        // Insertion-ordered counting keeps the tie-break deterministic.
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for address in messages
            .iter()
            .flat_map(|m| [m.from.as_str(), m.to.as_str()])
        {
            match counts.iter_mut().find(|(a, _)| *a == address) {
                Some((_, n)) => *n += 1,
                None => counts.push((address, 1)),
            }
        }
        let mut best: Option<(&str, usize)> = None;
        for (address, n) in &counts {
            if best.is_none_or(|(_, top)| *n > top) {
                best = Some((address, *n));
            }
        }
        if let Some((address, _)) = best {
            service_addresses.insert(address);
        }
    }

    let mut users: HashSet<&str> = HashSet::new();
    for message in messages {
        if !service_addresses.contains(message.from.as_str()) {
            users.insert(message.from.as_str());
        }
        if !service_addresses.contains(message.to.as_str()) {
            users.insert(message.to.as_str());
        }
    }
    users.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(from: &str, to: &str) -> MessageRecord {
        MessageRecord {
            sid: format!("SM-{from}-{to}"),
            from: from.into(),
            to: to.into(),
            body: None,
            status: "delivered".into(),
            direction: "outbound-api".into(),
            date_sent: None,
        }
    }

    #[test]
    fn pinned_sender_is_excluded_from_counterparts() {
        let messages = [record("A", "B"), record("A", "C"), record("A", "B")];
        let filter = MessageFilter {
            from: Some("A".into()),
            ..Default::default()
        };
        assert_eq!(count_unique_users(&messages, &filter), 2);
    }

    #[test]
    fn unpinned_service_is_inferred_from_frequency() {
        // "svc" appears in every record, so it is taken as the service.
        let messages = [record("svc", "B"), record("C", "svc"), record("svc", "D")];
        let filter = MessageFilter::default();
        assert_eq!(count_unique_users(&messages, &filter), 3);
    }

    #[test]
    fn frequency_tie_breaks_on_first_encounter() {
        // A and B both appear twice; A is seen first and wins, so only
        // B remains as a counterpart.
        let messages = [record("A", "B"), record("B", "A")];
        let filter = MessageFilter::default();
        assert_eq!(count_unique_users(&messages, &filter), 1);
    }

    #[test]
    fn empty_set_has_no_counterparts() {
        assert_eq!(count_unique_users(&[], &MessageFilter::default()), 0);
    }

    #[test]
    fn both_pinned_addresses_are_excluded() {
        let messages = [record("A", "B"), record("C", "B")];
        let filter = MessageFilter {
            from: Some("A".into()),
            to: Some("B".into()),
            ..Default::default()
        };
        assert_eq!(count_unique_users(&messages, &filter), 1);
    }
}
