//! Slack SQL Bot Library
//!
//! Answers natural-language questions from a Slack slash command by asking a
//! language model for one read-only SQL query, running it against PostgreSQL
//! and posting a formatted table back to the command's `response_url`.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod slack;
pub mod sql;
pub mod transport;

pub use config::Config;
pub use error::{BotError, BotResult};
pub use pipeline::{CommandPipeline, CommandWorker};
