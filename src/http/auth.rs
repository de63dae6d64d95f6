//! Login, logout and account endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::{error, info};

use super::AppState;
use crate::error::ProviderError;
use crate::provider::TwilioClient;
use crate::session::Session;

/// Build the auth and account routes.
pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/check-auth", get(check_auth))
        .route("/api/services", get(get_services))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    account_sid: String,
    #[serde(default)]
    auth_token: String,
}

/// POST /api/login — validate credentials against the provider and
/// store them as the active session.
async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> impl IntoResponse {
    if req.account_sid.is_empty() || req.auth_token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "success": false,
                "message": "Incomplete credentials"
            })),
        );
    }

    let client = TwilioClient::new(req.account_sid.clone(), SecretString::from(req.auth_token));
    match client.validate_credentials().await {
        Ok(account_name) => {
            info!(account = %account_name, "login succeeded");
            state
                .sessions
                .login(Session {
                    account_sid: req.account_sid,
                    account_name: account_name.clone(),
                    client: Arc::new(client),
                })
                .await;
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "success": true,
                    "message": "Login successful",
                    "account_name": account_name
                })),
            )
        }
        Err(ProviderError::Unauthorized) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "success": false,
                "message": "Invalid credentials"
            })),
        ),
        Err(e) => {
            error!(error = %e, "login validation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "message": "Server error"
                })),
            )
        }
    }
}

/// POST /api/logout — drop the active session.
async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    state.sessions.logout().await;
    Json(serde_json::json!({
        "success": true,
        "message": "Session closed"
    }))
}

/// GET /api/check-auth
async fn check_auth(State(state): State<AppState>) -> impl IntoResponse {
    match state.sessions.current().await {
        Some(session) => Json(serde_json::json!({
            "authenticated": true,
            "account_name": session.account_name
        })),
        None => Json(serde_json::json!({
            "authenticated": false,
            "account_name": null
        })),
    }
}

/// GET /api/services — the logged-in account's messaging numbers.
async fn get_services(State(state): State<AppState>) -> impl IntoResponse {
    let Some(session) = state.sessions.current().await else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "success": false,
                "message": "Not authenticated"
            })),
        );
    };

    match session.client.list_incoming_numbers().await {
        Ok(services) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "services": services
            })),
        ),
        Err(e) => {
            error!(error = %e, "failed to list messaging services");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "message": "Failed to fetch services"
                })),
            )
        }
    }
}
