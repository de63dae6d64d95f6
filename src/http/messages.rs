//! The message search endpoint.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tracing::debug;

use super::AppState;
use crate::config::Config;
use crate::dates::parse_datetime;
use crate::model::{MessageFilter, PaginatedResult};
use crate::service::MessageService;

/// Build the message routes.
pub fn message_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/messages", get(get_messages))
        .with_state(state)
}

/// GET /api/messages
///
/// Query parameters: `page`, `per_page`, `sid`, `start_date`,
/// `end_date`, `from`, `to`, `body`. Responses are cached for the
/// configured TTL, keyed by the full parameter set.
async fn get_messages(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    // Routine maintenance: sweep stale entries before each request.
    let evicted = state.cache.clear_expired().await;
    if evicted > 0 {
        debug!(evicted, "evicted expired cache entries");
    }

    if let Some(hit) = state.cache.get(&params).await {
        debug!("cache hit for message query");
        return Json(hit).into_response();
    }

    let (page, per_page) = parse_page_params(&params, &state.config);

    let Some(session) = state.sessions.current().await else {
        let payload = PaginatedResult::failed(page, per_page, "Not authenticated".to_string());
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::to_value(payload).unwrap_or_default()),
        )
            .into_response();
    };

    let filter = build_filter(&params, state.config.timezone_offset_hours);
    let service = MessageService::new(
        session.client.clone(),
        state.config.timezone_offset_hours,
        state.config.provider_page_size,
    );

    let result = service.page_messages(&filter, page, per_page).await;
    let value = serde_json::to_value(&result).unwrap_or_default();

    if result.error.is_some() {
        // Provider failures are not cached; the next request retries.
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(value)).into_response();
    }

    state.cache.set(&params, value.clone()).await;
    Json(value).into_response()
}

/// Parse `page` (1-based, unclamped) and `per_page` (defaulted and
/// bounded to the configured maximum, never zero).
fn parse_page_params(params: &BTreeMap<String, String>, config: &Config) -> (i64, usize) {
    let page = params
        .get("page")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(1);
    let per_page = params
        .get("per_page")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(config.default_page_size)
        .clamp(1, config.max_page_size);
    (page, per_page)
}

/// Assemble the filter from query parameters.
///
/// The end date gets the display-timezone offset added back before it
/// is compared against normalized record timestamps (the inverse of the
/// subtraction done on ingestion). Empty strings mean "no filter".
fn build_filter(params: &BTreeMap<String, String>, timezone_offset_hours: i64) -> MessageFilter {
    let end_date = parse_datetime(params.get("end_date").map(String::as_str))
        .map(|dt| dt + chrono::Duration::hours(timezone_offset_hours));

    MessageFilter {
        sid: non_empty(params.get("sid")),
        start_date: parse_datetime(params.get("start_date").map(String::as_str)),
        end_date,
        from: non_empty(params.get("from")),
        to: non_empty(params.get("to")),
        body: non_empty(params.get("body")),
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}
