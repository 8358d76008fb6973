//! Rewrite service configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the service API key.
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

/// Settings for the remote text-generation service.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Bearer token; never written out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Chat-completions endpoint.
    pub endpoint: String,

    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,

    /// Estimated tokens allowed per request.
    pub token_budget: usize,

    /// Part of the budget held back for instructions and context.
    pub token_reserve: usize,

    /// Per-request timeout.
    pub timeout_secs: u64,

    /// Attempts per sub-batch.
    pub max_attempts: usize,

    /// Base of the exponential backoff after transport failures.
    pub backoff_base_ms: u64,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.deepseek.com/v1/chat/completions".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            max_output_tokens: 4000,
            token_budget: 3500,
            token_reserve: 500,
            timeout_secs: 180,
            max_attempts: 3,
            backoff_base_ms: 1000,
        }
    }
}

impl RewriteConfig {
    /// Defaults with the API key taken from the environment.
    pub fn from_env() -> Self {
        Self::default().with_env_key()
    }

    /// Fill in the API key from the environment if none is set.
    pub fn with_env_key(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_token_budget(mut self, budget: usize) -> Self {
        self.token_budget = budget;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base_ms = base.as_millis() as u64;
        self
    }

    /// Budget left for slide content once the reserve is taken out.
    pub fn content_budget(&self) -> usize {
        self.token_budget.saturating_sub(self.token_reserve)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl std::fmt::Debug for RewriteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("token_budget", &self.token_budget)
            .field("token_reserve", &self.token_reserve)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RewriteConfig::default();
        assert_eq!(config.model, "deepseek-chat");
        assert_eq!(config.content_budget(), 3000);
        assert_eq!(config.timeout(), Duration::from_secs(180));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_api_key_not_serialized_or_printed() {
        let config = RewriteConfig::default().with_api_key("sk-secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let config: RewriteConfig =
            serde_json::from_str(r#"{"model": "other-model", "token_budget": 2000}"#).unwrap();
        assert_eq!(config.model, "other-model");
        assert_eq!(config.content_budget(), 1500);
        assert_eq!(config.max_output_tokens, 4000);
    }
}
