//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the chat-completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl LlmConfig {
    /// Create a new configuration.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout: default_timeout(),
        }
    }

    /// Create configuration from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::ApiKeyNotFound("OPENAI_API_KEY".to_string()))?;
        Ok(Self::new(api_key, DEFAULT_BASE_URL))
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_timeout() {
        let config = LlmConfig::new("test-key", "https://api.openai.com/v1")
            .with_timeout(Duration::from_secs(30));
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
