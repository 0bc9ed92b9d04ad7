//! Completion service integration.
//!
//! The bot makes a single chat-completion call per question. The transport is
//! hidden behind [`CompletionClient`] so the pipeline can be exercised with
//! [`MockCompletionClient`].

pub mod mock;
pub mod openai;

pub use mock::MockCompletionClient;
pub use openai::{OpenAiCompatibleClient, OpenAiConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BotResult;

/// Role of a message in a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

/// A single message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A text-completion service.
///
/// Implementations make exactly one request per call and never retry.
/// Failures are reported as [`crate::error::BotError::SqlGeneration`].
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the raw text of the first completion choice.
    async fn complete(&self, messages: &[Message]) -> BotResult<String>;
}
