//! HTTP layer — axum routes for the dashboard API.

pub mod auth;
pub mod messages;

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::cache::QueryCache;
use crate::config::Config;
use crate::session::SessionStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<QueryCache>,
    pub sessions: Arc<SessionStore>,
}

/// Build the full API router. CORS is left permissive because the
/// dashboard UI is served from a separate origin.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(messages::message_routes(state.clone()))
        .merge(auth::auth_routes(state))
        .layer(CorsLayer::permissive())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "msgboard"
    }))
}
