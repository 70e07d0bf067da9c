//! Screening provider (OpenSanctions / yente) configuration.

use serde::{Deserialize, Serialize};

const fn default_timeout_secs() -> u64 {
    30
}

fn default_algorithm() -> String {
    String::from("logic-v1")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Base URL of the provider API.
    #[serde(default)]
    pub url: String,

    /// API key sent as `Authorization: ApiKey ...`. Empty for self-hosted.
    #[serde(default)]
    pub api_key: String,

    /// Whether the provider is a self-hosted instance (enables enrichment).
    #[serde(default)]
    pub self_hosted: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Algorithm used when a config does not name one.
    #[serde(default = "default_algorithm")]
    pub default_algorithm: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            self_hosted: false,
            timeout_secs: default_timeout_secs(),
            default_algorithm: default_algorithm(),
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_configured() {
        let config = ProviderConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.default_algorithm, "logic-v1");
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let config = ProviderConfig {
            url: "http://yente:8000/".into(),
            ..Default::default()
        };
        assert_eq!(config.base_url(), "http://yente:8000");
    }
}
