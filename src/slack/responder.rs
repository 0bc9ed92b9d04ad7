//! Delivery of messages to a slash command's `response_url`.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::{BotError, BotResult, truncate_chars};
use crate::models::CallbackMessage;

/// Posts a message back to Slack.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn send(&self, response_url: &Url, text: &str) -> BotResult<()>;
}

/// Responder that posts `{"text": ..., "mrkdwn": true}` over HTTP.
#[derive(Debug, Clone)]
pub struct SlackResponder {
    client: Client,
}

impl SlackResponder {
    pub fn new(timeout: Duration) -> BotResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Responder for SlackResponder {
    async fn send(&self, response_url: &Url, text: &str) -> BotResult<()> {
        debug!(chars = text.chars().count(), "Posting to response_url");

        let response = self
            .client
            .post(response_url.clone())
            .json(&CallbackMessage::mrkdwn(text))
            .send()
            .await
            .map_err(|e| BotError::delivery(format!("Failed to post to response_url: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::delivery(format!(
                "response_url returned {}: {}",
                status,
                truncate_chars(&body, 200)
            )));
        }

        info!(status = status.as_u16(), "Response delivered");
        Ok(())
    }
}

/// Responder that keeps every message in memory instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingResponder {
    sent: Mutex<Vec<(Url, String)>>,
    fail: bool,
}

impl RecordingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records messages but reports every delivery as failed.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Texts sent so far, in order.
    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|s| s.iter().map(|(_, text)| text.clone()).collect())
            .unwrap_or_default()
    }

    /// Destination URLs, in order.
    pub fn urls(&self) -> Vec<Url> {
        self.sent
            .lock()
            .map(|s| s.iter().map(|(url, _)| url.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Responder for RecordingResponder {
    async fn send(&self, response_url: &Url, text: &str) -> BotResult<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((response_url.clone(), text.to_string()));
        }
        if self.fail {
            return Err(BotError::delivery("recording responder configured to fail"));
        }
        Ok(())
    }
}
