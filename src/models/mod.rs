//! Data models for the Slack SQL bot.
//!
//! This module re-exports all model types used throughout the application.

pub mod command;
pub mod query;

// Re-export commonly used types
pub use command::{Acknowledgment, CallbackMessage, Command, SlashCommandForm};
pub use query::{Cardinality, GeneratedQuery, Provenance, QueryResult, RawResultSet};
