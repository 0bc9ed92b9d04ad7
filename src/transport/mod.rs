//! Transport layer: the HTTP server Slack talks to.

pub mod http;

pub use http::{HttpServer, SLASH_COMMAND_PATH, router};
