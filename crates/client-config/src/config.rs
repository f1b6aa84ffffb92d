//! Configuration for the client.

use serde::{Deserialize, Serialize};
use url::Url;

/// Default identity backend URL (can be overridden at compile time via IDENTITY_API_URL env var).
pub const DEFAULT_IDENTITY_API_URL: &str = match option_env!("IDENTITY_API_URL") {
    Some(url) => url,
    None => "https://identity.wastelord.app",
};

/// Default publishable API key (public, safe to expose; compile-time override via IDENTITY_PUBLISHABLE_KEY).
pub const DEFAULT_IDENTITY_PUBLISHABLE_KEY: &str = match option_env!("IDENTITY_PUBLISHABLE_KEY") {
    Some(key) => key,
    None => "public-anon-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Identity backend project URL.
    #[serde(default = "default_api_url")]
    pub identity_api_url: String,
    /// Publishable API key sent with every backend request.
    #[serde(default = "default_publishable_key")]
    pub identity_publishable_key: String,
}

fn default_api_url() -> String {
    DEFAULT_IDENTITY_API_URL.to_string()
}

fn default_publishable_key() -> String {
    DEFAULT_IDENTITY_PUBLISHABLE_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            identity_api_url: DEFAULT_IDENTITY_API_URL.to_string(),
            identity_publishable_key: DEFAULT_IDENTITY_PUBLISHABLE_KEY.to_string(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Apply runtime environment overrides.
    ///
    /// `WASTELORD_LOG_LEVEL`, `WASTELORD_IDENTITY_API_URL` and
    /// `WASTELORD_IDENTITY_PUBLISHABLE_KEY` take precedence over the built-in
    /// defaults when set to a non-empty value.
    pub fn load_from_env(&mut self) {
        if let Some(level) = non_empty_env("WASTELORD_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = non_empty_env("WASTELORD_IDENTITY_API_URL") {
            self.identity_api_url = url;
        }
        if let Some(key) = non_empty_env("WASTELORD_IDENTITY_PUBLISHABLE_KEY") {
            self.identity_publishable_key = key;
        }
    }

    /// Validate that the configured backend URL parses.
    pub fn validate(&self) -> Result<(), String> {
        Url::parse(&self.identity_api_url)
            .map(|_| ())
            .map_err(|e| format!("Invalid identity_api_url: {}", e))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.identity_api_url, DEFAULT_IDENTITY_API_URL);
        assert_eq!(
            config.identity_publishable_key,
            DEFAULT_IDENTITY_PUBLISHABLE_KEY
        );
    }

    #[test]
    fn test_default_url_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_garbage_url() {
        let config = Config {
            identity_api_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override_ignores_empty_values() {
        let mut config = Config::default();
        std::env::set_var("WASTELORD_LOG_LEVEL", "  ");
        config.load_from_env();
        std::env::remove_var("WASTELORD_LOG_LEVEL");
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }
}
