//! Mock completion client for testing.
//!
//! Returns canned responses and records every request it receives.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::{BotError, BotResult};
use crate::llm::{CompletionClient, Message};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// Completion client that answers from a fixed reply.
#[derive(Debug)]
pub struct MockCompletionClient {
    reply: Reply,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockCompletionClient {
    /// Always answer with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Reply::Text(text.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with an SQL generation error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Reply::Fail(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of completion calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Messages sent with each call, in order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, messages: &[Message]) -> BotResult<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(message) => Err(BotError::sql_generation(message.clone())),
        }
    }
}
