//! Shared fixtures for integration tests.

#![allow(dead_code)]

use serde_json::Value as JsonValue;
use slack_sql_bot::db::{ConnectionPool, MockBehavior, MockConnectionSource, QueryExecutor};
use slack_sql_bot::llm::MockCompletionClient;
use slack_sql_bot::models::{Command, RawResultSet};
use slack_sql_bot::pipeline::CommandPipeline;
use slack_sql_bot::slack::RecordingResponder;
use slack_sql_bot::sql::TextToSql;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const RESPONSE_URL: &str = "https://hooks.slack.com/commands/T0001/1234/abcdef";

pub fn result_set(columns: &[&str], rows: Vec<Vec<JsonValue>>) -> RawResultSet {
    RawResultSet {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

pub fn command(question: &str) -> Command {
    Command::new(
        question,
        Url::parse(RESPONSE_URL).unwrap(),
        "U123",
        "C456",
    )
}

pub fn pool(source: Arc<MockConnectionSource>, max: u32) -> Arc<ConnectionPool> {
    Arc::new(ConnectionPool::new(source, max, Duration::from_millis(500)))
}

/// A pipeline wired to in-memory collaborators.
pub struct Harness {
    pub pipeline: Arc<CommandPipeline>,
    pub completion: Arc<MockCompletionClient>,
    pub source: Arc<MockConnectionSource>,
    pub pool: Arc<ConnectionPool>,
    pub responder: Arc<RecordingResponder>,
}

impl Harness {
    pub fn new(completion: MockCompletionClient, behavior: MockBehavior) -> Self {
        Self::with_responder(completion, behavior, RecordingResponder::new())
    }

    pub fn with_responder(
        completion: MockCompletionClient,
        behavior: MockBehavior,
        responder: RecordingResponder,
    ) -> Self {
        let completion = Arc::new(completion);
        let source = Arc::new(MockConnectionSource::new(behavior));
        let pool = pool(source.clone(), 5);
        let responder = Arc::new(responder);

        let executor = QueryExecutor::new(pool.clone(), 10, Duration::from_secs(30));
        let pipeline = Arc::new(CommandPipeline::new(
            TextToSql::new(completion.clone()),
            executor,
            responder.clone(),
            500,
        ));

        Self {
            pipeline,
            completion,
            source,
            pool,
            responder,
        }
    }
}
