//! Command processing after the slash command has been acknowledged.
//!
//! A job validates the question, generates SQL, executes it, formats the
//! result and posts exactly one message back to the command's `response_url`.
//! Failures are posted as a formatted error; delivery problems are only
//! logged.

pub mod stage;
pub mod worker;

pub use stage::{PipelineOutcome, PipelineStage};
pub use worker::{CommandDispatcher, CommandWorker};

use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

use crate::db::QueryExecutor;
use crate::error::{BotError, BotResult, ErrorCategory, UNEXPECTED_ERROR_MESSAGE};
use crate::models::Command;
use crate::slack::{Responder, format_error, format_table};
use crate::sql::TextToSql;
use stage::Progress;

pub const EMPTY_QUESTION_MESSAGE: &str =
    "Please ask a question.\nExample: `/ask-data show revenue by region`";

/// Check a trimmed question before any external call is made.
pub fn validate_question(question: &str, max_length: usize) -> BotResult<()> {
    if question.is_empty() {
        return Err(BotError::validation("empty question", EMPTY_QUESTION_MESSAGE));
    }
    let length = question.chars().count();
    if length > max_length {
        return Err(BotError::validation(
            format!("question is {} characters", length),
            format!("Question too long (max {} characters).", max_length),
        ));
    }
    Ok(())
}

/// Runs one command end to end.
pub struct CommandPipeline {
    generator: TextToSql,
    executor: QueryExecutor,
    responder: Arc<dyn Responder>,
    max_question_length: usize,
}

impl CommandPipeline {
    pub fn new(
        generator: TextToSql,
        executor: QueryExecutor,
        responder: Arc<dyn Responder>,
        max_question_length: usize,
    ) -> Self {
        Self {
            generator,
            executor,
            responder,
            max_question_length,
        }
    }

    pub async fn run(&self, command: Command) -> PipelineOutcome {
        info!(question = %command.question, "Processing command");
        let url = &command.response_url;
        let mut progress = Progress::acknowledged();

        progress.advance(PipelineStage::Validating);
        if let Err(err) = validate_question(&command.question, self.max_question_length) {
            info!(reason = %err, "Question rejected");
            let text = err.user_message().to_string();
            self.deliver(url, &text).await;
            return progress.failed(err.category(), text);
        }

        match self.answer(&command.question, &mut progress).await {
            Ok(text) => match self.responder.send(url, &text).await {
                Ok(()) => progress.delivered(text),
                Err(e) => {
                    error!(error = %e, "Failed to deliver result");
                    progress.failed(ErrorCategory::Delivery, text)
                }
            },
            Err(err) => {
                error!(
                    category = %err.category(),
                    stage = %progress.current(),
                    error = %err,
                    "Command failed"
                );
                let text = format_error(err.user_message());
                self.deliver(url, &text).await;
                progress.failed(err.category(), text)
            }
        }
    }

    /// Post the generic error after a job crashed.
    pub async fn report_unexpected(&self, response_url: &Url) {
        self.deliver(response_url, &format_error(UNEXPECTED_ERROR_MESSAGE))
            .await;
    }

    async fn answer(&self, question: &str, progress: &mut Progress) -> BotResult<String> {
        progress.advance(PipelineStage::GeneratingSql);
        let query = self.generator.generate(question).await?;
        info!(sql = %query.sql, "SQL generated");

        progress.advance(PipelineStage::Executing);
        let result = self.executor.execute(query).await?;

        progress.advance(PipelineStage::Formatting);
        Ok(format_table(&result.columns, &result.rows, &result.info()))
    }

    /// One best-effort delivery; failures are logged and dropped.
    async fn deliver(&self, url: &Url, text: &str) {
        if let Err(e) = self.responder.send(url, text).await {
            warn!(error = %e, "Failed to deliver message");
        }
    }
}
