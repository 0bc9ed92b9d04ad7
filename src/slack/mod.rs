//! Message formatting and delivery back to Slack.

pub mod format;
pub mod responder;

pub use format::{NO_RESULTS, format_error, format_table};
pub use responder::{RecordingResponder, Responder, SlackResponder};
