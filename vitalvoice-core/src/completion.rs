//! Text-completion client.
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol (Together AI by
//! default). Calls are never retried: a generative request may already have
//! produced side effects upstream of the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CompletionConfig;
use crate::models::{ConversationTurn, Role};

// ============================================================================
// TextCompletion trait
// ============================================================================

#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Complete a conversation. `system` is sent as the leading system
    /// message; `turns` follow in order.
    async fn complete(
        &self,
        system: &str,
        turns: &[ConversationTurn],
    ) -> Result<String, CompletionError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Completion response contained no reply")]
    EmptyReply,
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// TogetherCompletionClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct TogetherCompletionClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl TogetherCompletionClient {
    pub fn new(config: &CompletionConfig, api_key: String) -> Result<Self, CompletionError> {
        Self::with_base_url(config, api_key, config.base_url.clone())
    }

    /// Create a client against a custom base URL (for testing / self-hosted gateways).
    pub fn with_base_url(
        config: &CompletionConfig,
        api_key: String,
        base_url: String,
    ) -> Result<Self, CompletionError> {
        if api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TextCompletion for TogetherCompletionClient {
    async fn complete(
        &self,
        system: &str,
        turns: &[ConversationTurn],
    ) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatMessage {
            role: Role::System.as_str(),
            content: system,
        });
        messages.extend(turns.iter().map(|t| ChatMessage {
            role: t.role.as_str(),
            content: &t.content,
        }));

        let request = ChatRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Completion API error");
            return Err(CompletionError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(CompletionError::EmptyReply)
    }

    fn name(&self) -> &str {
        "together"
    }
}

// ============================================================================
// TESTS
// ============================================================================
