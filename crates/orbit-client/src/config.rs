//! Client configuration.
//!
//! Everything is resolved once at startup, either from the process
//! environment or from any key lookup (handy for tests).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::api::ApiConfig;
use crate::realtime::{dev_url, RelayConfig, SOCKET_PATH};

/// Remote API used when none is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://v2.api.noroff.dev";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable held a value that could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub relay: RelayConfig,
    /// JSON file persisting auth state; in-memory when unset.
    pub auth_store: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::new(DEFAULT_API_BASE_URL),
            relay: RelayConfig::default(),
            auth_store: None,
        }
    }
}

impl ClientConfig {
    /// Read `ORBIT_API_BASE_URL`, `ORBIT_API_KEY`, `ORBIT_SOCKET_URL`,
    /// `ORBIT_SOCKET_PORT`, `ORBIT_REALTIME`, `ORBIT_RECONNECT_MS` and
    /// `ORBIT_AUTH_STORE` from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration through `lookup`.
    ///
    /// The relay URL is `ORBIT_SOCKET_URL` when set, otherwise the
    /// development URL on `ORBIT_SOCKET_PORT` (default 3000).
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = get("ORBIT_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api = ApiConfig::new(&base_url).with_api_key(get("ORBIT_API_KEY"));

        let port = get("ORBIT_SOCKET_PORT")
            .map(|v| parse::<u16>("ORBIT_SOCKET_PORT", v))
            .transpose()?;
        let url = get("ORBIT_SOCKET_URL").unwrap_or_else(|| dev_url(port));
        let enabled = get("ORBIT_REALTIME")
            .map(|v| parse_flag("ORBIT_REALTIME", v))
            .transpose()?
            .unwrap_or(true);
        let mut relay = RelayConfig {
            enabled,
            url,
            ..RelayConfig::default()
        };
        if let Some(ms) = get("ORBIT_RECONNECT_MS") {
            relay.reconnect_delay = Duration::from_millis(parse("ORBIT_RECONNECT_MS", ms)?);
        }

        Ok(Self {
            api,
            relay,
            auth_store: get("ORBIT_AUTH_STORE").map(PathBuf::from),
        })
    }
}

/// Relay URL on the same origin as `origin` (`http` becomes `ws`, `https`
/// becomes `wss`). Returns `None` for other schemes.
#[must_use]
pub fn same_origin_socket_url(origin: &str) -> Option<String> {
    let origin = origin.trim().trim_end_matches('/');
    let (scheme, rest) = origin.split_once("://")?;
    let ws = match scheme.to_ascii_lowercase().as_str() {
        "http" => "ws",
        "https" => "wss",
        _ => return None,
    };
    Some(format!("{ws}://{rest}{SOCKET_PATH}"))
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api.base_url(), "https://v2.api.noroff.dev");
        assert_eq!(config.relay.url, "ws://localhost:3000/socket");
        assert!(config.relay.enabled);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("ORBIT_API_BASE_URL", "  https://api.example.com/// "),
            ("ORBIT_API_KEY", "key-1"),
            ("ORBIT_SOCKET_PORT", "4100"),
            ("ORBIT_REALTIME", "off"),
            ("ORBIT_RECONNECT_MS", "250"),
            ("ORBIT_AUTH_STORE", "/tmp/orbit-auth.json"),
        ]))
        .unwrap();

        assert_eq!(config.api.base_url(), "https://api.example.com");
        assert_eq!(config.api.api_key(), Some("key-1"));
        assert_eq!(config.relay.url, "ws://localhost:4100/socket");
        assert!(!config.relay.enabled);
        assert_eq!(config.relay.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.auth_store, Some(PathBuf::from("/tmp/orbit-auth.json")));
    }

    #[test]
    fn test_explicit_socket_url_wins() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("ORBIT_SOCKET_URL", "wss://relay.example.com/socket"),
            ("ORBIT_SOCKET_PORT", "4100"),
        ]))
        .unwrap();
        assert_eq!(config.relay.url, "wss://relay.example.com/socket");
    }

    #[test]
    fn test_invalid_values() {
        let err = ClientConfig::from_lookup(lookup(&[("ORBIT_SOCKET_PORT", "lots")])).unwrap_err();
        assert!(err.to_string().contains("ORBIT_SOCKET_PORT"));
        assert!(ClientConfig::from_lookup(lookup(&[("ORBIT_REALTIME", "maybe")])).is_err());
    }

    #[test]
    fn test_same_origin_socket_url() {
        assert_eq!(
            same_origin_socket_url("https://orbit.example.com/").as_deref(),
            Some("wss://orbit.example.com/socket")
        );
        assert_eq!(
            same_origin_socket_url("http://localhost:3000").as_deref(),
            Some("ws://localhost:3000/socket")
        );
        assert_eq!(same_origin_socket_url("file:///index.html"), None);
        assert_eq!(same_origin_socket_url("localhost"), None);
    }
}
