//! Client configuration.
//!
//! Every field has a default pointing at the production Sense service, so
//! an empty config (or none at all) is valid. Values can be overlaid from
//! the environment with [`ClientConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

use crate::error::{Error, Result};

/// Production REST API base.
pub const DEFAULT_API_URL: &str = "https://api.sense.com/apiservice/api/v1";

/// Production realtime feed base.
pub const DEFAULT_REALTIME_URL: &str = "wss://clientrt.sense.com";

/// Configuration for a [`SenseClient`](crate::SenseClient).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// REST API base URL (http or https)
    pub api_url: String,

    /// Realtime feed base URL (ws or wss)
    pub realtime_url: String,

    /// Reopen the realtime feed whenever it closes on its own
    pub auto_reconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
            auto_reconnect: true,
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `SENSE_API_URL`, `SENSE_REALTIME_URL` and
    /// `SENSE_AUTO_RECONNECT` where set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("SENSE_API_URL") {
            config.api_url = url;
        }
        if let Ok(url) = env::var("SENSE_REALTIME_URL") {
            config.realtime_url = url;
        }
        if let Ok(value) = env::var("SENSE_AUTO_RECONNECT") {
            config.auto_reconnect = parse_bool(&value).ok_or_else(|| {
                Error::Config(format!("SENSE_AUTO_RECONNECT: invalid boolean '{value}'"))
            })?;
        }

        config.validate()
    }

    /// Check both URLs and normalize away trailing slashes.
    pub fn validate(mut self) -> Result<Self> {
        self.api_url = check_url("api_url", &self.api_url, &["http", "https"])?;
        self.realtime_url = check_url("realtime_url", &self.realtime_url, &["ws", "wss"])?;
        Ok(self)
    }
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<String> {
    let parsed =
        Url::parse(value).map_err(|e| Error::Config(format!("{field}: '{value}': {e}")))?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(Error::Config(format!(
            "{field}: unsupported scheme '{}', expected one of {schemes:?}",
            parsed.scheme()
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use test_case::test_case;

    fn clear_env() {
        env::remove_var("SENSE_API_URL");
        env::remove_var("SENSE_REALTIME_URL");
        env::remove_var("SENSE_AUTO_RECONNECT");
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "https://api.sense.com/apiservice/api/v1");
        assert_eq!(config.realtime_url, "wss://clientrt.sense.com");
        assert!(config.auto_reconnect);
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"auto_reconnect": false}"#).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(!config.auto_reconnect);
    }

    #[test]
    fn test_validate_trims_trailing_slash() {
        let config = ClientConfig {
            api_url: "http://localhost:8080/api/".into(),
            realtime_url: "ws://localhost:8081/".into(),
            auto_reconnect: true,
        }
        .validate()
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:8080/api");
        assert_eq!(config.realtime_url, "ws://localhost:8081");
    }

    #[test_case("ftp://example.com", "wss://example.com"; "bad api scheme")]
    #[test_case("https://example.com", "https://example.com"; "bad realtime scheme")]
    #[test_case("not a url", "wss://example.com"; "unparsable")]
    fn test_validate_rejects(api_url: &str, realtime_url: &str) {
        let result = ClientConfig {
            api_url: api_url.into(),
            realtime_url: realtime_url.into(),
            auto_reconnect: true,
        }
        .validate();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("SENSE_API_URL", "http://127.0.0.1:9000/v1");
        env::set_var("SENSE_AUTO_RECONNECT", "no");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:9000/v1");
        assert_eq!(config.realtime_url, DEFAULT_REALTIME_URL);
        assert!(!config.auto_reconnect);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_bool() {
        clear_env();
        env::set_var("SENSE_AUTO_RECONNECT", "sometimes");

        assert!(matches!(ClientConfig::from_env(), Err(Error::Config(_))));

        clear_env();
    }
}
