//! Error types for the Slack SQL bot.
//!
//! Every variant carries two strings: an internal diagnostic for the logs and
//! a user-facing message that is safe to post back to Slack. The pipeline only
//! ever shows the latter, through [`BotError::user_message`].

use thiserror::Error;

/// Maximum number of characters of a driver message surfaced to the user.
const USER_SQL_ERROR_CHARS: usize = 100;

/// Coarse error category, used for logging and the pipeline's `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    SqlGeneration,
    Database,
    Validation,
    Delivery,
    Config,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SqlGeneration => "sql_generation",
            Self::Database => "database",
            Self::Validation => "validation",
            Self::Delivery => "delivery",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Which part of query execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// The connection could not be obtained or broke mid-flight.
    Connection,
    /// The server rejected the statement (unknown column, syntax, ...).
    Statement,
    /// The statement exceeded its time limit.
    Timeout,
    /// Anything not classified above.
    Other,
}

#[derive(Error, Debug)]
pub enum BotError {
    #[error("SQL generation failed: {message}")]
    SqlGeneration { message: String, user_message: String },

    #[error("Database error ({kind:?}): {message}")]
    Database {
        message: String,
        kind: DatabaseErrorKind,
        /// e.g., "42703" for undefined column
        sql_state: Option<String>,
        user_message: String,
    },

    #[error("Validation failed: {message}")]
    Validation { message: String, user_message: String },

    #[error("Delivery failed: {message}")]
    Delivery { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BotError {
    /// Create an SQL generation error. The user always sees the same hint.
    pub fn sql_generation(message: impl Into<String>) -> Self {
        Self::SqlGeneration {
            message: message.into(),
            user_message: "Failed to generate SQL. Please rephrase your question.".to_string(),
        }
    }

    /// The connection to the database was lost or could not be established.
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            kind: DatabaseErrorKind::Connection,
            sql_state: None,
            user_message: "Database connection lost. Try again.".to_string(),
        }
    }

    /// The server rejected the statement; a truncated driver message is shown.
    pub fn statement(message: impl Into<String>, sql_state: Option<String>) -> Self {
        let message = message.into();
        let user_message = format!(
            "Query error: {}",
            truncate_chars(&message, USER_SQL_ERROR_CHARS)
        );
        Self::Database {
            message,
            kind: DatabaseErrorKind::Statement,
            sql_state,
            user_message,
        }
    }

    /// The statement ran longer than the configured limit.
    pub fn query_timeout(limit_secs: u64) -> Self {
        Self::Database {
            message: format!("Query exceeded timeout of {}s", limit_secs),
            kind: DatabaseErrorKind::Timeout,
            sql_state: None,
            user_message: format!("Query took too long (max {} seconds)", limit_secs),
        }
    }

    /// Unclassified database failure.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            kind: DatabaseErrorKind::Other,
            sql_state: None,
            user_message: "An error occurred executing the query".to_string(),
        }
    }

    /// Create a validation error with a separate user-facing message.
    pub fn validation(message: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            user_message: user_message.into(),
        }
    }

    /// Create a delivery (callback) error.
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SqlGeneration { .. } => ErrorCategory::SqlGeneration,
            Self::Database { .. } => ErrorCategory::Database,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Delivery { .. } => ErrorCategory::Delivery,
            Self::Config { .. } => ErrorCategory::Config,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Database failure kind, if this is a database error.
    pub fn database_kind(&self) -> Option<DatabaseErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The message that may be shown to the requester.
    ///
    /// Errors without a dedicated user message map to a generic one so that
    /// internal details never leak into Slack.
    pub fn user_message(&self) -> &str {
        match self {
            Self::SqlGeneration { user_message, .. }
            | Self::Database { user_message, .. }
            | Self::Validation { user_message, .. } => user_message,
            Self::Delivery { .. } => "Failed to send response to Slack",
            Self::Config { .. } | Self::Internal { .. } => UNEXPECTED_ERROR_MESSAGE,
        }
    }
}

/// Shown for faults that have no classified user message.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// Classify sqlx errors into the bot's database error kinds.
impl From<sqlx::Error> for BotError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                // 57014: query_canceled, raised when statement_timeout fires.
                // The limit is not known here; QueryExecutor rewrites the
                // message with the configured one.
                if code.as_deref() == Some("57014") {
                    return BotError::Database {
                        message: db_err.message().to_string(),
                        kind: DatabaseErrorKind::Timeout,
                        sql_state: code,
                        user_message: "Query took too long".to_string(),
                    };
                }
                BotError::statement(db_err.message(), code)
            }
            sqlx::Error::Io(io_err) => BotError::connection_lost(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => {
                BotError::connection_lost(format!("TLS error: {}", tls_err))
            }
            sqlx::Error::Protocol(msg) => {
                BotError::connection_lost(format!("Protocol error: {}", msg))
            }
            sqlx::Error::PoolTimedOut => {
                BotError::connection_lost("Timed out acquiring a pooled connection")
            }
            sqlx::Error::PoolClosed => BotError::connection_lost("Connection pool is closed"),
            sqlx::Error::Configuration(msg) => {
                BotError::connection_lost(format!("Configuration error: {}", msg))
            }
            sqlx::Error::ColumnNotFound(col) => {
                BotError::statement(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => {
                BotError::database(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => BotError::database(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => BotError::connection_lost("Database worker crashed"),
            _ => BotError::database(format!("Unknown database error: {}", err)),
        }
    }
}

/// Completion API transport failures are always SQL generation failures.
impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BotError::sql_generation(format!("Completion request timed out: {}", err))
        } else if err.is_connect() {
            BotError::sql_generation(format!("Failed to reach completion API: {}", err))
        } else {
            BotError::sql_generation(format!("Completion request failed: {}", err))
        }
    }
}

/// Result type alias for bot operations.
pub type BotResult<T> = Result<T, BotError>;

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
