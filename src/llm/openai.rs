//! OpenAI-compatible chat completion client.
//!
//! Groq, which the bot uses by default, exposes the same request and response
//! shape as OpenAI's `/v1/chat/completions`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, DEFAULT_LLM_TIMEOUT_SECS};
use crate::error::{BotError, BotResult, truncate_chars};
use crate::llm::{CompletionClient, Message};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.llm_api_url, &config.llm_api_key, &config.llm_model)
            .with_timeout(config.llm_timeout)
    }
}

/// Chat completion client over HTTP.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiCompatibleClient {
    pub fn new(config: OpenAiConfig) -> BotResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BotError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn build_request(&self, messages: &[Message]) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: 0.0,
            stream: false,
        }
    }

    /// Turn a non-success response into an SQL generation error.
    fn parse_error(status: reqwest::StatusCode, body: &str) -> BotError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return BotError::sql_generation("Authentication failed. Check GROQ_API_KEY.");
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return BotError::sql_generation("Rate limited by completion API");
        }
        if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(body) {
            return BotError::sql_generation(format!(
                "Completion API error ({}): {}",
                status, error_response.error.message
            ));
        }
        BotError::sql_generation(format!(
            "Completion API error ({}): {}",
            status,
            truncate_chars(body, 200)
        ))
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[Message]) -> BotResult<String> {
        let request = self.build_request(messages);
        debug!(model = %self.config.model, messages = messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            BotError::sql_generation(format!("Failed to parse completion response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BotError::sql_generation("Completion response had no content"))
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
