//! Connection settings for the realtime client
//!
//! Settings are plain values: the base WebSocket URL of the Argus backend,
//! the retry ceiling, and the first reconnect delay. They can be built in
//! code or read from `ARGUS_*` environment variables.

use std::time::Duration;

use url::Url;

use crate::error::{RealtimeError, Result};

/// Default number of reconnect attempts before the manager gives up
pub const DEFAULT_MAX_RETRIES: u32 = 7;

/// Default delay before the first reconnect attempt
pub const DEFAULT_INITIAL_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Path of the realtime endpoint, relative to the base WebSocket URL
pub const OPEN_PATH: &str = "open/";

pub const ENV_WS_URL: &str = "ARGUS_WS_URL";
pub const ENV_MAX_RETRIES: &str = "ARGUS_REALTIME_MAX_RETRIES";
pub const ENV_INITIAL_RETRY_SECS: &str = "ARGUS_REALTIME_INITIAL_RETRY_SECS";
pub const ENV_TOKEN: &str = "ARGUS_TOKEN";
pub const ENV_HEALTH_CHECK_SECS: &str = "ARGUS_HEALTH_CHECK_SECS";

/// Settings consumed by the realtime service
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSettings {
    /// Base WebSocket URL, e.g. `ws://localhost:8000/ws`
    pub ws_base_url: Url,
    /// Retry ceiling; exceeding it puts the manager in `failed`
    pub max_retries: u32,
    /// Delay before the first reconnect; doubles on every scheduled retry
    pub initial_retry_interval: Duration,
    /// Session token sent as the `token` cookie during the handshake
    pub auth_token: Option<String>,
    /// Period of the keep-alive probe, if any
    pub health_check_interval: Option<Duration>,
}

impl RealtimeSettings {
    /// Create settings for a base URL with default retry behaviour.
    ///
    /// `http`/`https` URLs are accepted and mapped to `ws`/`wss`.
    pub fn new(ws_base_url: &str) -> Result<Self> {
        Ok(Self {
            ws_base_url: parse_ws_url(ws_base_url)?,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_retry_interval: DEFAULT_INITIAL_RETRY_INTERVAL,
            auth_token: None,
            health_check_interval: None,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Result<Self> {
        if max_retries == 0 {
            return Err(RealtimeError::Config(
                "max_retries must be a positive integer".to_string(),
            ));
        }
        self.max_retries = max_retries;
        Ok(self)
    }

    pub fn with_initial_retry_interval(mut self, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(RealtimeError::Config(
                "initial retry interval must be greater than zero".to_string(),
            ));
        }
        self.initial_retry_interval = interval;
        Ok(self)
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = Some(interval);
        self
    }

    /// Full URL of the realtime endpoint (`<base>/open/`)
    pub fn endpoint(&self) -> Result<Url> {
        let base = self.ws_base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, OPEN_PATH))?)
    }

    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    ///
    /// Invalid or non-positive numeric values fall back to their defaults,
    /// the same way the dashboard treats its runtime configuration.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_WS_URL)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RealtimeError::Config(format!("{} is not set", ENV_WS_URL)))?;

        let mut settings = Self::new(url.trim())?;

        if let Some(retries) = lookup(ENV_MAX_RETRIES).and_then(|v| parse_positive(&v)) {
            settings.max_retries = retries as u32;
        }
        if let Some(secs) = lookup(ENV_INITIAL_RETRY_SECS).and_then(|v| parse_positive(&v)) {
            settings.initial_retry_interval = Duration::from_secs(secs);
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.is_empty()) {
            settings.auth_token = Some(token);
        }
        if let Some(secs) = lookup(ENV_HEALTH_CHECK_SECS).and_then(|v| parse_positive(&v)) {
            settings.health_check_interval = Some(Duration::from_secs(secs));
        }

        Ok(settings)
    }
}

fn parse_positive(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0 && *n <= u32::MAX as u64)
}

fn parse_ws_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(RealtimeError::Config(format!(
                "unsupported URL scheme for realtime endpoint: {}",
                other
            )))
        }
    };
    if url.scheme() != scheme {
        url.set_scheme(scheme)
            .map_err(|_| RealtimeError::Config(format!("cannot convert {} to {}", raw, scheme)))?;
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_endpoint_appends_open_path() {
        let settings = RealtimeSettings::new("ws://localhost:8000/ws").unwrap();
        assert_eq!(
            settings.endpoint().unwrap().as_str(),
            "ws://localhost:8000/ws/open/"
        );

        let settings = RealtimeSettings::new("wss://argus.example.org/ws/").unwrap();
        assert_eq!(
            settings.endpoint().unwrap().as_str(),
            "wss://argus.example.org/ws/open/"
        );
    }

    #[test]
    fn test_http_scheme_is_mapped() {
        let settings = RealtimeSettings::new("https://argus.example.org/ws").unwrap();
        assert_eq!(settings.ws_base_url.scheme(), "wss");
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        assert!(matches!(
            RealtimeSettings::new("ftp://argus.example.org"),
            Err(RealtimeError::Config(_))
        ));
    }

    #[test]
    fn test_zero_max_retries_rejected() {
        let settings = RealtimeSettings::new("ws://localhost/ws").unwrap();
        assert!(settings.with_max_retries(0).is_err());
    }

    #[test]
    fn test_from_lookup_defaults() {
        let settings = RealtimeSettings::from_lookup(lookup_from(&[(
            ENV_WS_URL,
            "ws://localhost:8000/ws",
        )]))
        .unwrap();
        assert_eq!(settings.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(settings.initial_retry_interval, DEFAULT_INITIAL_RETRY_INTERVAL);
        assert_eq!(settings.auth_token, None);
        assert_eq!(settings.health_check_interval, None);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let settings = RealtimeSettings::from_lookup(lookup_from(&[
            (ENV_WS_URL, "ws://localhost:8000/ws"),
            (ENV_MAX_RETRIES, "3"),
            (ENV_INITIAL_RETRY_SECS, "2"),
            (ENV_TOKEN, "secret"),
            (ENV_HEALTH_CHECK_SECS, "30"),
        ]))
        .unwrap();
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.initial_retry_interval, Duration::from_secs(2));
        assert_eq!(settings.auth_token.as_deref(), Some("secret"));
        assert_eq!(settings.health_check_interval, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_lookup_ignores_invalid_retries() {
        for bad in ["0", "-2", "many"] {
            let settings = RealtimeSettings::from_lookup(lookup_from(&[
                (ENV_WS_URL, "ws://localhost:8000/ws"),
                (ENV_MAX_RETRIES, bad),
            ]))
            .unwrap();
            assert_eq!(settings.max_retries, DEFAULT_MAX_RETRIES, "input {}", bad);
        }
    }

    #[test]
    fn test_from_lookup_requires_url() {
        assert!(matches!(
            RealtimeSettings::from_lookup(lookup_from(&[])),
            Err(RealtimeError::Config(_))
        ));
    }
}
