//! Client configuration from environment variables.

use std::time::Duration;

use crate::ws::ReconnectConfig;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SSE_RETRY_MS: u64 = 3000;

/// Settings shared by the HTTP and realtime clients of one deployment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub reconnect: ReconnectConfig,
    /// How long a correlated search waits for its response.
    pub search_timeout: Duration,
    /// SSE reconnect delay until the server sends its own `retry:`.
    pub sse_retry: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            reconnect: ReconnectConfig::default(),
            search_timeout: Duration::from_millis(DEFAULT_SEARCH_TIMEOUT_MS),
            sse_retry: Duration::from_millis(DEFAULT_SSE_RETRY_MS),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    pub fn with_sse_retry(mut self, retry: Duration) -> Self {
        self.sse_retry = retry;
        self
    }

    /// Read configuration from the environment.
    ///
    /// Environment variables:
    /// - `APEXKIT_API_URL`: backend base URL (default: "http://localhost:5000")
    /// - `APEXKIT_TOKEN`: bearer token (optional)
    /// - `APEXKIT_RECONNECT_MS`: initial realtime reconnect delay
    /// - `APEXKIT_SEARCH_TIMEOUT_MS`: correlated search timeout (default: 5000)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("APEXKIT_API_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        config.token = lookup("APEXKIT_TOKEN").filter(|v| !v.is_empty());

        if let Some(ms) = parse_millis(&lookup, "APEXKIT_RECONNECT_MS") {
            config.reconnect.initial_delay_ms = ms;
        }
        if let Some(ms) = parse_millis(&lookup, "APEXKIT_SEARCH_TIMEOUT_MS") {
            config.search_timeout = Duration::from_millis(ms);
        }

        config
    }
}

fn parse_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token, None);
        assert_eq!(config.search_timeout, Duration::from_secs(5));
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("APEXKIT_API_URL", "https://api.example.com"),
            ("APEXKIT_TOKEN", "jwt"),
            ("APEXKIT_RECONNECT_MS", "250"),
            ("APEXKIT_SEARCH_TIMEOUT_MS", "900"),
        ]));
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.token.as_deref(), Some("jwt"));
        assert_eq!(config.reconnect.initial_delay_ms, 250);
        assert_eq!(config.search_timeout, Duration::from_millis(900));
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = ClientConfig::from_lookup(lookup(&[("APEXKIT_SEARCH_TIMEOUT_MS", "soon")]));
        assert_eq!(config.search_timeout, Duration::from_millis(DEFAULT_SEARCH_TIMEOUT_MS));
    }
}
