use std::sync::Arc;

use msgboard::cache::QueryCache;
use msgboard::config::Config;
use msgboard::http::{self, AppState};
use msgboard::provider::TwilioClient;
use msgboard::session::{Session, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    let cache = Arc::new(QueryCache::new(config.cache_ttl));
    let sessions = Arc::new(SessionStore::new());

    // With startup credentials in the environment, log in immediately
    // instead of waiting for the login endpoint.
    if let (Some(sid), Some(token)) = (&config.account_sid, &config.auth_token) {
        let client = TwilioClient::new(sid.clone(), token.clone());
        match client.validate_credentials().await {
            Ok(account_name) => {
                tracing::info!(account = %account_name, "logged in with startup credentials");
                sessions
                    .login(Session {
                        account_sid: sid.clone(),
                        account_name,
                        client: Arc::new(client),
                    })
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "startup credentials rejected; waiting for login");
            }
        }
    }

    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        cache,
        sessions,
    };
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "msgboard listening");
    axum::serve(listener, app).await?;

    Ok(())
}
