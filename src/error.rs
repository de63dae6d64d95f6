//! Error types for msgboard.

/// Top-level error type for the dashboard backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the messaging provider's REST API.
///
/// A missing record is not represented here: point lookups return
/// `Ok(None)` at the provider boundary, so absence and failure stay
/// distinguishable.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected credentials")]
    Unauthorized,

    #[error("Provider returned {status}: {body}")]
    Api { status: u16, body: String },
}
