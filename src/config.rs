//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Dashboard configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port for the HTTP server.
    pub port: u16,
    /// How long a cached page response stays valid. Short, because the
    /// dashboard is used as a near-real-time monitor.
    pub cache_ttl: Duration,
    /// Hard cap on the `per_page` query parameter.
    pub max_page_size: usize,
    /// Page size applied when the caller omits `per_page`.
    pub default_page_size: usize,
    /// Page size used for provider-side pagination while streaming.
    pub provider_page_size: usize,
    /// Hours subtracted from provider timestamps on ingestion (display
    /// timezone; added back to end-date filters before querying).
    pub timezone_offset_hours: i64,
    /// Optional startup credentials. When set, the server logs in on
    /// boot instead of waiting for `POST /api/login`.
    pub account_sid: Option<String>,
    pub auth_token: Option<SecretString>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            cache_ttl: Duration::from_secs(20),
            max_page_size: 100,
            default_page_size: 50,
            provider_page_size: 100,
            timezone_offset_hours: 6, // UTC-6
            account_sid: None,
            auth_token: None,
        }
    }
}

impl Config {
    /// Build a configuration from `MSGBOARD_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            port: parse_env("PORT", defaults.port)?,
            cache_ttl: Duration::from_secs(parse_env(
                "MSGBOARD_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            max_page_size: parse_env("MSGBOARD_MAX_PAGE_SIZE", defaults.max_page_size)?,
            default_page_size: parse_env("MSGBOARD_DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            provider_page_size: parse_env(
                "MSGBOARD_PROVIDER_PAGE_SIZE",
                defaults.provider_page_size,
            )?,
            timezone_offset_hours: parse_env(
                "MSGBOARD_TZ_OFFSET_HOURS",
                defaults.timezone_offset_hours,
            )?,
            account_sid: std::env::var("TWILIO_ACCOUNT_SID").ok(),
            auth_token: std::env::var("TWILIO_AUTH_TOKEN").ok().map(SecretString::from),
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
