//! Mock connection source for testing.
//!
//! Every connection it hands out follows one scripted behavior and records
//! the statements it was asked to run, transaction control included.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::db::pool::{ConnectionSource, SqlConnection};
use crate::error::{BotError, BotResult, DatabaseErrorKind};
use crate::models::RawResultSet;

/// What a mock connection does when asked for rows.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return these rows.
    Rows(RawResultSet),
    /// Fail to hand out a connection at all.
    RefuseConnection,
    /// Drop the connection mid-query.
    LoseConnection,
    /// The server rejects the statement with this message.
    StatementError(String),
    /// `BEGIN` succeeds, then the server rejects the session settings.
    RejectSessionSetup(String),
    /// The server cancels the statement (SQLSTATE 57014).
    ServerTimeout,
    /// Never answer. A rollback waits on the pending reply too.
    Hang,
    /// Panic while fetching.
    Panic,
}

#[derive(Debug)]
pub struct MockConnectionSource {
    behavior: MockBehavior,
    statements: Arc<Mutex<Vec<String>>>,
    discarded: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl MockConnectionSource {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            statements: Arc::new(Mutex::new(Vec::new())),
            discarded: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
        }
    }

    /// Answer every query with `rows`.
    pub fn with_rows(rows: RawResultSet) -> Self {
        Self::new(MockBehavior::Rows(rows))
    }

    /// Every statement run so far, across all connections.
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Connections dropped instead of returned for reuse.
    pub fn discarded(&self) -> usize {
        self.discarded.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionSource for MockConnectionSource {
    async fn acquire(&self) -> BotResult<Box<dyn SqlConnection>> {
        if matches!(self.behavior, MockBehavior::RefuseConnection) {
            return Err(BotError::connection_lost("connection refused"));
        }
        Ok(Box::new(MockConnection {
            behavior: self.behavior.clone(),
            statements: Arc::clone(&self.statements),
            discarded: Arc::clone(&self.discarded),
        }))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct MockConnection {
    behavior: MockBehavior,
    statements: Arc<Mutex<Vec<String>>>,
    discarded: Arc<AtomicUsize>,
}

impl MockConnection {
    fn record(&self, statement: impl Into<String>) {
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(statement.into());
        }
    }
}

#[async_trait]
impl SqlConnection for MockConnection {
    async fn begin_read_only(&mut self, statement_timeout: Duration) -> BotResult<()> {
        self.record("BEGIN READ ONLY");
        if let MockBehavior::RejectSessionSetup(message) = &self.behavior {
            return Err(BotError::statement(message.clone(), Some("22023".to_string())));
        }
        self.record(format!(
            "SET LOCAL statement_timeout = {}",
            statement_timeout.as_millis()
        ));
        Ok(())
    }

    async fn fetch_all(&mut self, sql: &str) -> BotResult<RawResultSet> {
        self.record(sql);
        match &self.behavior {
            MockBehavior::Rows(rows) => Ok(rows.clone()),
            MockBehavior::RefuseConnection
            | MockBehavior::LoseConnection
            | MockBehavior::RejectSessionSetup(_) => {
                Err(BotError::connection_lost("server closed the connection unexpectedly"))
            }
            MockBehavior::StatementError(message) => {
                Err(BotError::statement(message.clone(), Some("42703".to_string())))
            }
            MockBehavior::ServerTimeout => Err(BotError::Database {
                message: "canceling statement due to statement timeout".to_string(),
                kind: DatabaseErrorKind::Timeout,
                sql_state: Some("57014".to_string()),
                user_message: "Query took too long".to_string(),
            }),
            MockBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(RawResultSet::default())
            }
            MockBehavior::Panic => panic!("mock connection panicked while fetching"),
        }
    }

    async fn commit(&mut self) -> BotResult<()> {
        self.record("COMMIT");
        Ok(())
    }

    async fn rollback(&mut self) -> BotResult<()> {
        self.record("ROLLBACK");
        if matches!(self.behavior, MockBehavior::Hang) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }

    fn discard(&mut self) {
        self.discarded.fetch_add(1, Ordering::SeqCst);
    }
}
