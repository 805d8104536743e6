//! OpenAI-compatible upstream client.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// One turn of the conversation, as sent over both wire contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// The upstream could not produce a usable token stream.
///
/// Never retried; the caller surfaces one error event and ends the session.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned {0}")]
    Status(StatusCode),

    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Connection settings for the completion endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the OpenAI-compatible API, without a trailing slash.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Streaming chat-completion client.
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    stream: bool,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    messages: &'a [ChatMessage],
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Open a streaming completion.
    ///
    /// Returns the raw response so the caller can consume its byte stream;
    /// a non-success status is already an [`UpstreamError`] here.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: Option<u32>,
    ) -> Result<reqwest::Response, UpstreamError> {
        let body = CompletionRequest {
            model: &self.config.model,
            stream: true,
            temperature: 0.7,
            max_tokens,
            messages,
        };
        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "upstream rejected completion request");
            return Err(UpstreamError::Status(status));
        }
        Ok(response)
    }
}
