//! Twilio REST API client.
//!
//! Presents the provider's paged `Messages.json` listing as a flat
//! forward-only stream by following `next_page_uri` links, plus the
//! point-lookup, account-validation and phone-number calls the
//! dashboard needs.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{MessageSource, ProviderMessage, StreamParams};
use crate::error::ProviderError;

const TWILIO_API_BASE: &str = "https://api.twilio.com";
const API_VERSION: &str = "2010-04-01";

/// Authenticated client for one Twilio account.
pub struct TwilioClient {
    http: reqwest::Client,
    account_sid: String,
    auth_token: SecretString,
    base_url: String,
}

/// One page of the provider's message list.
#[derive(Debug, Deserialize)]
struct MessagePage {
    messages: Vec<ProviderMessage>,
    /// Path (relative to the API host) of the next page, if any.
    next_page_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResource {
    friendly_name: String,
}

#[derive(Debug, Deserialize)]
struct IncomingPhoneNumberPage {
    incoming_phone_numbers: Vec<IncomingPhoneNumber>,
}

#[derive(Debug, Deserialize)]
struct IncomingPhoneNumber {
    sid: String,
    phone_number: String,
    friendly_name: Option<String>,
    #[serde(default)]
    capabilities: serde_json::Value,
}

/// A messaging service as shown in the dashboard's service picker.
#[derive(Debug, Clone, Serialize)]
pub struct MessagingService {
    pub sid: String,
    /// Channel-prefixed address, e.g. `whatsapp:+14155551234`.
    pub phone_number: String,
    pub friendly_name: String,
    pub service_type: String,
    pub capabilities: serde_json::Value,
}

impl TwilioClient {
    pub fn new(account_sid: String, auth_token: SecretString) -> Self {
        Self::with_base_url(account_sid, auth_token, TWILIO_API_BASE.to_string())
    }

    /// Point the client at a different API host (used by tests).
    pub fn with_base_url(account_sid: String, auth_token: SecretString, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            account_sid,
            auth_token,
            base_url,
        }
    }

    fn account_url(&self, resource: &str) -> String {
        format!(
            "{}/{API_VERSION}/Accounts/{}{resource}",
            self.base_url, self.account_sid
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Validate the credentials by fetching the account resource;
    /// returns the account's friendly name.
    pub async fn validate_credentials(&self) -> Result<String, ProviderError> {
        let account: AccountResource = self.get_json(&self.account_url(".json"), &[]).await?;
        Ok(account.friendly_name)
    }

    /// List the account's incoming phone numbers as dashboard services,
    /// deduplicated by number. The dashboard fronts WhatsApp traffic,
    /// so numbers are presented with the `whatsapp:` channel prefix.
    pub async fn list_incoming_numbers(&self) -> Result<Vec<MessagingService>, ProviderError> {
        let page: IncomingPhoneNumberPage = self
            .get_json(
                &self.account_url("/IncomingPhoneNumbers.json"),
                &[("PageSize".to_string(), "100".to_string())],
            )
            .await?;

        let mut seen = HashSet::new();
        let mut services = Vec::new();
        for number in page.incoming_phone_numbers {
            if !seen.insert(number.phone_number.clone()) {
                continue;
            }
            services.push(MessagingService {
                sid: number.sid,
                phone_number: format!("whatsapp:{}", number.phone_number),
                friendly_name: number.friendly_name.unwrap_or_else(|| number.phone_number.clone()),
                service_type: "WhatsApp".to_string(),
                capabilities: number.capabilities,
            });
        }
        Ok(services)
    }

    async fn first_page(&self, query: Vec<(String, String)>) -> Result<MessagePage, ProviderError> {
        self.get_json(&self.account_url("/Messages.json"), &query).await
    }

    async fn follow_page(&self, uri: String) -> Result<MessagePage, ProviderError> {
        let url = format!("{}{uri}", self.base_url);
        self.get_json(&url, &[]).await
    }
}

/// Query parameters for the first list request.
///
/// Time bounds are sent at the provider's whole-day granularity. The
/// after bound truncates down and the before bound rounds up to the
/// next day, so the provider window always contains the exact client
/// window; the caller re-checks exact bounds client-side.
fn stream_query(params: &StreamParams) -> Vec<(String, String)> {
    let mut query = vec![("PageSize".to_string(), params.page_size.to_string())];
    if let Some(after) = params.date_sent_after {
        query.push(("DateSent>".to_string(), after.date().format("%Y-%m-%d").to_string()));
    }
    if let Some(before) = params.date_sent_before {
        let day_after = before.date().succ_opt().unwrap_or_else(|| before.date());
        query.push(("DateSent<".to_string(), day_after.format("%Y-%m-%d").to_string()));
    }
    if let Some(from) = &params.from {
        query.push(("From".to_string(), from.clone()));
    }
    if let Some(to) = &params.to {
        query.push(("To".to_string(), to.clone()));
    }
    query
}

enum NextFetch {
    Query(Vec<(String, String)>),
    Uri(String),
    Done,
}

struct StreamState {
    next: NextFetch,
    buffer: VecDeque<ProviderMessage>,
    yielded: usize,
    limit: usize,
}

#[async_trait]
impl MessageSource for TwilioClient {
    async fn fetch_message(&self, sid: &str) -> Result<Option<ProviderMessage>, ProviderError> {
        let url = self.account_url(&format!("/Messages/{sid}.json"));
        match self.get_json(&url, &[]).await {
            Ok(message) => Ok(Some(message)),
            Err(ProviderError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn stream_messages(
        &self,
        params: StreamParams,
    ) -> BoxStream<'_, Result<ProviderMessage, ProviderError>> {
        let state = StreamState {
            next: NextFetch::Query(stream_query(&params)),
            buffer: VecDeque::new(),
            yielded: 0,
            limit: params.limit,
        };

        stream::unfold(state, move |mut state| async move {
            loop {
                if state.yielded >= state.limit {
                    return None;
                }
                if let Some(message) = state.buffer.pop_front() {
                    state.yielded += 1;
                    return Some((Ok(message), state));
                }
                let fetch = std::mem::replace(&mut state.next, NextFetch::Done);
                let page = match fetch {
                    NextFetch::Query(query) => self.first_page(query).await,
                    NextFetch::Uri(uri) => self.follow_page(uri).await,
                    NextFetch::Done => return None,
                };
                match page {
                    Ok(page) => {
                        state.buffer.extend(page.messages);
                        if let Some(uri) = page.next_page_uri {
                            state.next = NextFetch::Uri(uri);
                        }
                    }
                    Err(e) => {
                        // Terminal: yield the error once, then end.
                        state.yielded = state.limit;
                        return Some((Err(e), state));
                    }
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_datetime;

    #[test]
    fn stream_query_formats_day_granular_bounds() {
        let params = StreamParams {
            date_sent_after: parse_datetime(Some("2024-03-01T08:15")),
            date_sent_before: parse_datetime(Some("2024-03-05")),
            from: Some("+111".into()),
            to: None,
            page_size: 100,
            limit: 1050,
        };
        let query = stream_query(&params);
        assert!(query.contains(&("PageSize".to_string(), "100".to_string())));
        assert!(query.contains(&("DateSent>".to_string(), "2024-03-01".to_string())));
        assert!(query.contains(&("DateSent<".to_string(), "2024-03-06".to_string())));
        assert!(query.contains(&("From".to_string(), "+111".to_string())));
        assert!(!query.iter().any(|(k, _)| k == "To"));
    }

    #[test]
    fn end_bound_rounds_up_so_the_provider_window_covers_the_client_window() {
        // An end bound with a time-of-day (here the offset-shifted tail
        // of a local day) must not truncate to its own date: the last
        // hours of the range would be excluded upstream and the
        // client-side re-check could never recover them.
        let params = StreamParams {
            date_sent_before: parse_datetime(Some("2024-03-06T05:59")),
            page_size: 100,
            limit: 1050,
            ..Default::default()
        };
        let query = stream_query(&params);
        assert!(query.contains(&("DateSent<".to_string(), "2024-03-07".to_string())));
        assert!(!query.contains(&("DateSent<".to_string(), "2024-03-06".to_string())));
    }

    #[test]
    fn message_page_deserializes_provider_json() {
        let raw = serde_json::json!({
            "messages": [{
                "sid": "SM1",
                "from": "whatsapp:+14155551234",
                "to": "whatsapp:+5215550001111",
                "body": "hola",
                "status": "delivered",
                "direction": "outbound-api",
                "date_sent": "Tue, 05 Mar 2024 20:30:00 +0000",
                "num_segments": "1"
            }],
            "next_page_uri": "/2010-04-01/Accounts/AC123/Messages.json?PageToken=PA1",
            "page": 0
        });
        let page: MessagePage = serde_json::from_value(raw).unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].sid, "SM1");
        assert!(page.next_page_uri.is_some());
    }
}
