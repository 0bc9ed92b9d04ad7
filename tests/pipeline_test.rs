//! End-to-end tests for command processing.
//!
//! The completion service, database and Slack are replaced with in-memory
//! doubles; everything in between is the production code path.

mod common;

use common::{Harness, RESPONSE_URL, command, result_set};
use serde_json::json;
use slack_sql_bot::db::MockBehavior;
use slack_sql_bot::error::{ErrorCategory, UNEXPECTED_ERROR_MESSAGE};
use slack_sql_bot::llm::MockCompletionClient;
use slack_sql_bot::pipeline::{CommandWorker, EMPTY_QUESTION_MESSAGE, PipelineStage};
use slack_sql_bot::slack::{RecordingResponder, format_error};
use std::collections::HashSet;
use std::time::Duration;

const TOTAL_REVENUE_SQL: &str = "SELECT SUM(revenue) AS total_revenue FROM sales_daily";

fn total_revenue() -> MockBehavior {
    MockBehavior::Rows(result_set(&["total_revenue"], vec![vec![json!("125000.50")]]))
}

#[tokio::test]
async fn test_show_total_revenue() {
    let h = Harness::new(MockCompletionClient::replying(TOTAL_REVENUE_SQL), total_revenue());

    let outcome = h.pipeline.run(command("Show total revenue")).await;

    let expected = "*Results:*\n```\ntotal_revenue\n-------------\n125000.50\n```\n_1 row_";
    assert_eq!(outcome.message, expected);
    assert_eq!(
        outcome.stages,
        vec![
            PipelineStage::Received,
            PipelineStage::Acknowledged,
            PipelineStage::Validating,
            PipelineStage::GeneratingSql,
            PipelineStage::Executing,
            PipelineStage::Formatting,
            PipelineStage::Delivered,
        ]
    );
    assert_eq!(h.responder.messages(), vec![expected]);
    assert_eq!(h.responder.urls()[0].as_str(), RESPONSE_URL);

    // Generated SQL gets its trailing semicolon before execution
    assert!(
        h.source
            .statements()
            .contains(&format!("{};", TOTAL_REVENUE_SQL))
    );
    assert_eq!(h.completion.call_count(), 1);
}

#[tokio::test]
async fn test_connection_error_is_reported_as_connection_lost() {
    let h = Harness::new(
        MockCompletionClient::replying(TOTAL_REVENUE_SQL),
        MockBehavior::RefuseConnection,
    );

    let outcome = h.pipeline.run(command("Show total revenue")).await;

    assert_eq!(
        outcome.final_stage(),
        PipelineStage::Failed(ErrorCategory::Database)
    );
    assert_eq!(
        h.responder.messages(),
        vec!["```\n⚠️ Database connection lost. Try again.\n```"]
    );
}

#[tokio::test]
async fn test_empty_question_never_reaches_the_model() {
    let h = Harness::new(MockCompletionClient::replying(TOTAL_REVENUE_SQL), total_revenue());

    let outcome = h.pipeline.run(command("")).await;

    assert_eq!(h.completion.call_count(), 0);
    assert!(h.source.statements().is_empty());
    assert_eq!(
        outcome.final_stage(),
        PipelineStage::Failed(ErrorCategory::Validation)
    );
    // Validation messages are sent as-is, not wrapped as errors
    assert_eq!(h.responder.messages(), vec![EMPTY_QUESTION_MESSAGE]);
}

#[tokio::test]
async fn test_question_length_limit() {
    let h = Harness::new(MockCompletionClient::replying(TOTAL_REVENUE_SQL), total_revenue());

    h.pipeline.run(command(&"a".repeat(501))).await;

    assert_eq!(h.completion.call_count(), 0);
    let messages = h.responder.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("too long"));
    assert_eq!(messages[0], "Question too long (max 500 characters).");
}

#[tokio::test]
async fn test_question_at_limit_is_accepted() {
    let h = Harness::new(MockCompletionClient::replying(TOTAL_REVENUE_SQL), total_revenue());
    let outcome = h.pipeline.run(command(&"a".repeat(500))).await;
    assert!(outcome.is_delivered());
}

#[tokio::test]
async fn test_generation_failure() {
    let h = Harness::new(MockCompletionClient::failing("401 Unauthorized"), total_revenue());

    let outcome = h.pipeline.run(command("Show total revenue")).await;

    assert_eq!(
        outcome.final_stage(),
        PipelineStage::Failed(ErrorCategory::SqlGeneration)
    );
    assert_eq!(
        h.responder.messages(),
        vec![format_error(
            "Failed to generate SQL. Please rephrase your question."
        )]
    );
    assert!(h.source.statements().is_empty());
}

#[tokio::test]
async fn test_model_output_that_mutates_is_refused() {
    let h = Harness::new(
        MockCompletionClient::replying("DELETE FROM sales_daily"),
        total_revenue(),
    );

    let outcome = h.pipeline.run(command("delete everything")).await;

    assert_eq!(
        outcome.final_stage(),
        PipelineStage::Failed(ErrorCategory::Validation)
    );
    assert_eq!(
        h.responder.messages(),
        vec![format_error(
            "Only SELECT queries are allowed (no CREATE, DROP, etc)"
        )]
    );
    assert!(h.source.statements().is_empty());
    assert_eq!(h.pool.snapshot().checkouts, 0);
}

#[tokio::test]
async fn test_statement_error_shows_driver_message() {
    let h = Harness::new(
        MockCompletionClient::replying("SELECT revenu FROM sales_daily"),
        MockBehavior::StatementError("column \"revenu\" does not exist".to_string()),
    );

    h.pipeline.run(command("Show revenue")).await;

    assert_eq!(
        h.responder.messages(),
        vec![format_error("Query error: column \"revenu\" does not exist")]
    );
}

#[tokio::test]
async fn test_delivery_failure_is_not_retried() {
    let h = Harness::with_responder(
        MockCompletionClient::replying(TOTAL_REVENUE_SQL),
        total_revenue(),
        RecordingResponder::failing(),
    );

    let outcome = h.pipeline.run(command("Show total revenue")).await;

    assert_eq!(
        outcome.final_stage(),
        PipelineStage::Failed(ErrorCategory::Delivery)
    );
    assert_eq!(h.responder.messages().len(), 1);
}

#[tokio::test]
async fn test_stages_are_never_revisited() {
    let behaviors = [
        total_revenue(),
        MockBehavior::LoseConnection,
        MockBehavior::ServerTimeout,
    ];
    for behavior in behaviors {
        let h = Harness::new(MockCompletionClient::replying(TOTAL_REVENUE_SQL), behavior);
        let outcome = h.pipeline.run(command("Show total revenue")).await;

        let unique: HashSet<String> = outcome.stages.iter().map(|s| s.to_string()).collect();
        assert_eq!(unique.len(), outcome.stages.len(), "{:?}", outcome.stages);
        assert!(outcome.final_stage().is_terminal());
        assert_eq!(h.responder.messages().len(), 1);
    }
}

#[tokio::test]
async fn test_worker_reports_panics_with_generic_message() {
    let h = Harness::new(
        MockCompletionClient::replying(TOTAL_REVENUE_SQL),
        MockBehavior::Panic,
    );
    let worker = CommandWorker::start(h.pipeline.clone());

    worker
        .dispatcher()
        .submit(command("Show total revenue"))
        .unwrap();
    assert!(worker.shutdown(Duration::from_secs(5)).await);

    assert_eq!(
        h.responder.messages(),
        vec![format_error(UNEXPECTED_ERROR_MESSAGE)]
    );
    let stats = h.pool.snapshot();
    assert_eq!(stats.checkouts, 1);
    assert_eq!(stats.releases, 1);
}

#[tokio::test]
async fn test_worker_runs_jobs_and_drains_on_shutdown() {
    let h = Harness::new(MockCompletionClient::replying(TOTAL_REVENUE_SQL), total_revenue());
    let worker = CommandWorker::start(h.pipeline.clone());
    let dispatcher = worker.dispatcher();

    for i in 0..8 {
        dispatcher
            .submit(command(&format!("Show total revenue {}", i)))
            .unwrap();
    }
    assert!(worker.shutdown(Duration::from_secs(5)).await);

    assert_eq!(h.responder.messages().len(), 8);
    assert_eq!(h.completion.call_count(), 8);
    assert_eq!(h.pool.snapshot().releases, 8);

    // Nothing is accepted after shutdown
    assert!(dispatcher.submit(command("late")).is_err());
}
