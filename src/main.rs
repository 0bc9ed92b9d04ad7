//! Slack SQL bot - main entry point.
//!
//! Answers `/ask-data` slash commands by generating a read-only SQL query,
//! running it against PostgreSQL and posting the result back to Slack.

use clap::Parser;
use slack_sql_bot::auth::SignatureVerifier;
use slack_sql_bot::config::Config;
use slack_sql_bot::db::{ConnectionPool, QueryExecutor};
use slack_sql_bot::llm::{OpenAiCompatibleClient, OpenAiConfig};
use slack_sql_bot::pipeline::{CommandPipeline, CommandWorker};
use slack_sql_bot::slack::SlackResponder;
use slack_sql_bot::sql::TextToSql;
use slack_sql_bot::transport::HttpServer;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    let config = Config::parse();
    init_tracing(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Error: {}", e);
        eprintln!();
        eprintln!("Required: SLACK_SIGNING_SECRET, GROQ_API_KEY, DATABASE_URL");
        eprintln!("Set them in the environment or in a .env file.");
        std::process::exit(1);
    }

    info!(
        model = %config.llm_model,
        max_rows = config.max_result_rows,
        query_timeout_secs = config.query_timeout,
        "Starting Slack SQL bot v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = Arc::new(ConnectionPool::connect(&config).await?);
    let executor = QueryExecutor::new(
        Arc::clone(&pool),
        config.max_result_rows,
        config.query_timeout_duration(),
    );

    let completion = OpenAiCompatibleClient::new(OpenAiConfig::from_config(&config))?;
    let generator = TextToSql::new(Arc::new(completion));
    let responder = SlackResponder::new(config.callback_timeout_duration())?;

    let pipeline = Arc::new(CommandPipeline::new(
        generator,
        executor,
        Arc::new(responder),
        config.max_question_length,
    ));
    let worker = CommandWorker::start(pipeline);

    let server = HttpServer::new(
        &config.http_host,
        config.http_port,
        worker,
        pool,
        Arc::new(SignatureVerifier::new(&config.slack_signing_secret)),
    );

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
