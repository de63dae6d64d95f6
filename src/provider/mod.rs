//! Provider boundary — the message source abstraction and its Twilio
//! implementation.

pub mod twilio;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use twilio::TwilioClient;

/// A message in the provider's native shape, straight off the wire.
///
/// Converted to a dashboard record in exactly one place
/// ([`crate::model::MessageRecord::from_provider`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub sid: String,
    pub from: String,
    pub to: String,
    pub body: Option<String>,
    pub status: String,
    pub direction: String,
    /// RFC 2822 timestamp, null until the provider actually sends.
    pub date_sent: Option<String>,
}

/// Pre-filter parameters the provider's list API accepts directly.
#[derive(Debug, Clone, Default)]
pub struct StreamParams {
    /// Inclusive lower bound on send time (whole-day granularity at
    /// the provider).
    pub date_sent_after: Option<NaiveDateTime>,
    /// Inclusive upper bound on send time.
    pub date_sent_before: Option<NaiveDateTime>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Records per provider-side page.
    pub page_size: usize,
    /// Maximum records the stream will yield before stopping.
    pub limit: usize,
}

/// Forward-only access to a remote message store.
///
/// The seam between the pagination logic and the real provider; tests
/// drive the core algorithm through a synthetic implementation.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Point lookup by identifier. Absence is `Ok(None)`, not an error.
    async fn fetch_message(&self, sid: &str) -> Result<Option<ProviderMessage>, ProviderError>;

    /// Lazy reverse-chronological stream of messages matching the
    /// pre-filter, ending after `params.limit` records at the latest.
    /// No random access and no reliable total count.
    fn stream_messages(
        &self,
        params: StreamParams,
    ) -> BoxStream<'_, Result<ProviderMessage, ProviderError>>;
}
