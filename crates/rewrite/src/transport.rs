//! Chat-completion transport.
//!
//! `ChatTransport` is the seam between the client's batching/retry logic
//! and the network. `HttpTransport` talks to an OpenAI-style
//! chat-completions endpoint; tests substitute their own implementations.

use crate::config::RewriteConfig;
use crate::prompt::SYSTEM_MESSAGE;
use deck_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// Failure of a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("service returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("unreadable response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Timeouts and connection failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Connect(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Connect(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of one chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// System framing plus `prompt` as the user message.
    pub fn new(config: &RewriteConfig, prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_MESSAGE.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
        }
    }

    /// Content of the last user message.
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Sends chat requests and returns the assistant's text.
pub trait ChatTransport: Send + Sync {
    fn complete(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = std::result::Result<String, TransportError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTPS transport using bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    /// Build a transport from `config`.
    ///
    /// Fails with `MissingApiKey` when no key is configured, before any
    /// request can be made.
    pub fn new(config: &RewriteConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(Error::MissingApiKey)?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::RewriteError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }
}

impl ChatTransport for HttpTransport {
    async fn complete(&self, request: &ChatRequest) -> std::result::Result<String, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TransportError::Decode("response has no message content".to_string()))
    }
}
