use std::time::Duration;

use url::Url;

use crate::util::env as env_util;

/// Endpoint variables, highest priority first.
pub const URL_KEYS: &[&str] = &["SUPABASE_URL", "EXPO_PUBLIC_SUPABASE_URL"];

/// Credential variables, highest priority first.
pub const KEY_KEYS: &[&str] = &[
    "SUPABASE_SERVICE_KEY",
    "SUPABASE_ANON_KEY",
    "EXPO_PUBLIC_SUPABASE_ANON_KEY",
];

const TIMEOUT_KEY: &str = "ATLAS_HTTP_TIMEOUT_SECS";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Supabase URL not found (tried {})", URL_KEYS.join(", "))]
    MissingUrl,

    #[error("Supabase key not found (tried {})", KEY_KEYS.join(", "))]
    MissingKey,

    #[error("{key} is not a valid http(s) URL: {value}")]
    InvalidUrl { key: &'static str, value: String },
}

/// Connection parameters for the hosted database API.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: Url,
    pub api_key: String,
    /// Which variable supplied the endpoint.
    pub url_source: &'static str,
    /// Which variable supplied the credential.
    pub key_source: &'static str,
    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        env_util::init_env();

        let (url_source, raw_url) =
            env_util::env_first(URL_KEYS).ok_or(ConfigError::MissingUrl)?;
        let (key_source, api_key) =
            env_util::env_first(KEY_KEYS).ok_or(ConfigError::MissingKey)?;

        let url = parse_endpoint(url_source, &raw_url)?;
        let timeout_secs = env_util::env_parse(TIMEOUT_KEY, DEFAULT_TIMEOUT_SECS);
        let timeout = Duration::from_secs(timeout_secs);

        Ok(Self {
            url,
            api_key: api_key.trim().to_string(),
            url_source,
            key_source,
            timeout,
        })
    }

    /// Every variable this tool reads, for `check-env`.
    pub fn known_keys() -> Vec<&'static str> {
        URL_KEYS
            .iter()
            .chain(KEY_KEYS)
            .copied()
            .chain(std::iter::once(TIMEOUT_KEY))
            .collect()
    }
}

fn parse_endpoint(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        key,
        value: raw.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(invalid()),
    }
}
