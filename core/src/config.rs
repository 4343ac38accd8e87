//! Client configuration.
//!
//! The backend origin is fixed configuration, not discovered at runtime.
//! Hosts may override it through `ESTIMATOR_API_URL`.

/// Environment variable that overrides [`ClientConfig::base_url`].
pub const API_URL_ENV: &str = "ESTIMATOR_API_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Session key the bearer token is persisted under.
pub const DEFAULT_SESSION_KEY: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub session_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Defaults, with the base URL taken from the environment when set.
    pub fn from_env() -> Self {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        }
    }
}
