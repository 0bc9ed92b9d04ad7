//! Query execution engine.
//!
//! Every statement goes through the same steps:
//! - the read-only gate, before any connection is touched
//! - a pooled connection, held by a guard for the whole call
//! - a read-only transaction with a server-side statement timeout
//! - a client-side timeout a little above the server one
//! - the row cap, applied after all rows are fetched so the total is known

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::db::pool::{ConnectionPool, PooledConnection};
use crate::error::{BotError, BotResult, DatabaseErrorKind};
use crate::models::{GeneratedQuery, QueryResult, RawResultSet};
use crate::sql::gate;

/// Extra time the client waits beyond the server-side statement timeout.
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on the ROLLBACK issued after a failed statement.
const ROLLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs validated SQL against the shared pool.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: Arc<ConnectionPool>,
    row_cap: usize,
    query_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(pool: Arc<ConnectionPool>, row_cap: usize, query_timeout: Duration) -> Self {
        Self {
            pool,
            row_cap,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Execute a model-generated query, consuming it.
    pub async fn execute(&self, query: GeneratedQuery) -> BotResult<QueryResult> {
        self.execute_sql(&query.sql).await
    }

    /// Execute a raw SQL string.
    pub async fn execute_sql(&self, sql: &str) -> BotResult<QueryResult> {
        gate::check(sql)?;

        let start = Instant::now();
        debug!(
            sql = %sql,
            row_cap = self.row_cap,
            timeout_secs = self.query_timeout.as_secs(),
            "Executing query"
        );

        let mut conn = self.pool.acquire().await?;
        let raw = self
            .run_read_only(&mut conn, sql)
            .await
            .map_err(|e| self.classify_timeout(e))?;
        drop(conn);

        let execution_time_ms = start.elapsed().as_millis() as u64;
        let result = QueryResult::capped(raw, self.row_cap, execution_time_ms);

        if result.cardinality.is_truncated() {
            warn!(cardinality = %result.cardinality, "Query result truncated");
        }
        info!(
            cardinality = %result.cardinality,
            execution_time_ms,
            "Query executed"
        );
        Ok(result)
    }

    async fn run_read_only(
        &self,
        conn: &mut PooledConnection,
        sql: &str,
    ) -> BotResult<RawResultSet> {
        let limit = self.query_timeout + CLIENT_TIMEOUT_GRACE;
        match timeout(limit, transaction(conn, sql, self.query_timeout)).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => {
                // Covers a failed BEGIN/SET LOCAL too; the caller sees `e`
                roll_back(conn).await;
                Err(e)
            }
            Err(_) => {
                // The server may still be answering; a ROLLBACK would queue behind it
                warn!(
                    timeout_secs = limit.as_secs(),
                    "Client timeout fired, discarding connection"
                );
                conn.discard();
                Err(BotError::query_timeout(self.query_timeout.as_secs()))
            }
        }
    }

    /// Server-side cancellations carry no limit; report the configured one.
    fn classify_timeout(&self, err: BotError) -> BotError {
        match err.database_kind() {
            Some(DatabaseErrorKind::Timeout) => BotError::query_timeout(self.query_timeout.as_secs()),
            _ => err,
        }
    }
}

async fn transaction(
    conn: &mut PooledConnection,
    sql: &str,
    statement_timeout: Duration,
) -> BotResult<RawResultSet> {
    conn.begin_read_only(statement_timeout).await?;
    let raw = conn.fetch_all(sql).await?;
    conn.commit().await?;
    Ok(raw)
}

async fn roll_back(conn: &mut PooledConnection) {
    match timeout(ROLLBACK_TIMEOUT, conn.rollback()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Rollback after failure did not succeed"),
        Err(_) => {
            warn!("Rollback timed out, discarding connection");
            conn.discard();
        }
    }
}
