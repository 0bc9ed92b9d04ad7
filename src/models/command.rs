//! Slash command payloads and Slack response bodies.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BotError, BotResult};

/// Form fields Slack posts for a slash command. Unused fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlashCommandForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// A verified slash command, self-contained so it can be handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub question: String,
    pub response_url: Url,
    pub user_id: String,
    pub channel_id: String,
}

impl Command {
    pub fn new(
        question: impl Into<String>,
        response_url: Url,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            response_url,
            user_id: user_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

impl TryFrom<SlashCommandForm> for Command {
    type Error = BotError;

    fn try_from(form: SlashCommandForm) -> BotResult<Self> {
        let raw_url = form
            .response_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                BotError::validation("missing response_url", "Missing response_url")
            })?;
        let response_url = Url::parse(raw_url.trim()).map_err(|e| {
            BotError::validation(format!("invalid response_url: {}", e), "Invalid response_url")
        })?;

        let or_unknown = |v: Option<String>| {
            v.filter(|s| !s.is_empty())
                .unwrap_or_else(|| "unknown".to_string())
        };

        Ok(Self {
            question: form.text.trim().to_string(),
            response_url,
            user_id: or_unknown(form.user_id),
            channel_id: or_unknown(form.channel_id),
        })
    }
}

/// Immediate reply to the slash command request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Acknowledgment {
    pub response_type: String,
    pub text: String,
}

impl Acknowledgment {
    pub fn processing() -> Self {
        Self {
            response_type: "ephemeral".to_string(),
            text: "Processing your request...".to_string(),
        }
    }
}

/// Body posted to the `response_url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackMessage {
    pub text: String,
    pub mrkdwn: bool,
}

impl CallbackMessage {
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mrkdwn: true,
        }
    }
}
