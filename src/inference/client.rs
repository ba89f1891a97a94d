//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests to a local LLM endpoint
//! (Ollama's `/v1` surface by default) and decodes each answer into a
//! [`ModelReply`]. No retries and no fallback models: a failed call is
//! returned to the caller as-is.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::errors::InferenceError;
use super::response::parse_completion_response;
use super::types::{ChatCompletionRequest, ChatMessage, ModelReply, ToolDefinition};
use crate::config::ModelSettings;

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── ChatModel ───────────────────────────────────────────────────────────────

/// The external chat-completion service as seen by the reply loop.
///
/// Implemented by [`InferenceClient`] for the real endpoint and by scripted
/// stubs in tests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one model turn over the full transcript with `tools` available.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError>;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for the local LLM inference endpoint.
pub struct InferenceClient {
    http: HttpClient,
    settings: ModelSettings,
}

impl InferenceClient {
    /// Create a new inference client. Does NOT check connectivity; that
    /// happens on the first request.
    pub fn new(settings: ModelSettings) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: settings.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, settings })
    }

    /// The model name sent with every request.
    pub fn model_name(&self) -> &str {
        &self.settings.model_name
    }

    /// The base URL of the model endpoint.
    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// Send a non-streaming chat completion request.
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError> {
        let url = self.completions_url();
        let tools = if tools.is_empty() {
            None
        } else {
            Some(tools.to_vec())
        };

        let body = ChatCompletionRequest {
            model: self.settings.model_name.clone(),
            messages: messages.to_vec(),
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            tools,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream: false,
        };

        // Log the request metadata (not the full body, it can be huge)
        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = body.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            max_tokens = body.max_tokens,
            "LLM request"
        );

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        duration_secs: self.settings.request_timeout_secs,
                    }
                } else {
                    InferenceError::ConnectionFailed {
                        endpoint: url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| InferenceError::ResponseParse {
                reason: format!("failed to read response body: {e}"),
            })?;

        parse_completion_response(&body_text)
    }

    /// Check if the model endpoint is reachable. Does not consume
    /// inference tokens.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/models", self.settings.base_url.trim_end_matches('/'));
        match self.http.get(&url).timeout(CONNECT_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ChatModel for InferenceClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError> {
        self.chat_completion(messages, tools).await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
