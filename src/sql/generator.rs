//! Natural language to SQL with a single completion call.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{BotError, BotResult};
use crate::llm::{CompletionClient, Message};
use crate::models::GeneratedQuery;

/// The only table the model is told about.
pub const TABLE_NAME: &str = "sales_daily";

/// System instruction sent with every question.
pub const SYSTEM_PROMPT: &str = "You are a PostgreSQL expert.

There is ONLY one table:

sales_daily(
    date DATE,
    region TEXT,
    category TEXT,
    revenue NUMERIC(12,2),
    orders INTEGER,
    created_at TIMESTAMPTZ
)

Rules:
- Output ONLY ONE valid PostgreSQL SELECT statement.
- Do NOT explain anything.
- Do NOT add markdown.
- Do NOT add comments.
- Only return SQL.";

/// Converts questions into SQL.
///
/// The output is not checked for safety here; [`crate::sql::gate`] does that
/// right before execution.
pub struct TextToSql {
    client: Arc<dyn CompletionClient>,
}

impl TextToSql {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// The two messages sent for `question`.
    pub fn build_messages(question: &str) -> [Message; 2] {
        [Message::system(SYSTEM_PROMPT), Message::user(question)]
    }

    /// Generate one SQL statement for `question`.
    pub async fn generate(&self, question: &str) -> BotResult<GeneratedQuery> {
        info!(question = %question, "Generating SQL");

        let raw = self
            .client
            .complete(&Self::build_messages(question))
            .await
            .map_err(|e| {
                error!(error = %e, "SQL generation failed");
                match e {
                    BotError::SqlGeneration { .. } => e,
                    other => BotError::sql_generation(other.to_string()),
                }
            })?;

        let sql = normalize_sql(&raw)
            .ok_or_else(|| BotError::sql_generation("Completion returned no SQL"))?;

        debug!(sql = %sql, "SQL generated");
        Ok(GeneratedQuery::model_generated(sql))
    }
}

/// Trim and ensure a trailing `;`. `None` when nothing is left.
pub fn normalize_sql(raw: &str) -> Option<String> {
    let sql = raw.trim();
    if sql.is_empty() {
        return None;
    }
    if sql.ends_with(';') {
        Some(sql.to_string())
    } else {
        Some(format!("{};", sql))
    }
}
