//! Connection pool management.
//!
//! [`ConnectionPool`] is created once in `main`, shared through an `Arc`, and
//! closed during shutdown. It bounds concurrent checkouts with a semaphore and
//! hands out [`PooledConnection`] guards that release on drop, so every
//! checkout is matched by exactly one release on every exit path.
//!
//! The actual connections come from a [`ConnectionSource`]; production uses
//! [`PgConnectionSource`] on top of sqlx's `PgPool`.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool, Postgres};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::types;
use crate::error::{BotError, BotResult};
use crate::models::RawResultSet;

/// A single database connection as seen by the executor.
#[async_trait]
pub trait SqlConnection: Send {
    /// Open a read-only transaction with a per-statement time limit.
    async fn begin_read_only(&mut self, statement_timeout: Duration) -> BotResult<()>;

    /// Run `sql` and fetch every row.
    async fn fetch_all(&mut self, sql: &str) -> BotResult<RawResultSet>;

    async fn commit(&mut self) -> BotResult<()>;

    async fn rollback(&mut self) -> BotResult<()>;

    /// Close the connection when it is released instead of reusing it.
    fn discard(&mut self);
}

/// Where pooled connections come from.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    async fn acquire(&self) -> BotResult<Box<dyn SqlConnection>>;

    /// Close all underlying connections.
    async fn close(&self);
}

/// Checkout/release counters, readable at any time.
#[derive(Debug, Default)]
pub struct PoolStats {
    checkouts: AtomicU64,
    releases: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub checkouts: u64,
    pub releases: u64,
    pub max_connections: u32,
}

impl PoolSnapshot {
    /// Connections currently checked out.
    pub fn in_use(&self) -> u64 {
        self.checkouts - self.releases
    }
}

#[derive(Clone)]
pub struct ConnectionPool {
    source: Arc<dyn ConnectionSource>,
    permits: Arc<Semaphore>,
    max_connections: u32,
    acquire_timeout: Duration,
    stats: Arc<PoolStats>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("stats", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl ConnectionPool {
    /// Wrap a connection source, allowing at most `max_connections` checkouts.
    pub fn new(
        source: Arc<dyn ConnectionSource>,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            source,
            permits: Arc::new(Semaphore::new(max_connections as usize)),
            max_connections,
            acquire_timeout,
            stats: Arc::new(PoolStats::default()),
        }
    }

    /// Connect to PostgreSQL using the configured bounds.
    pub async fn connect(config: &Config) -> BotResult<Self> {
        info!(
            min = config.pool_min,
            max = config.pool_max,
            "Initializing database connection pool"
        );
        let source = PgConnectionSource::connect(config).await?;
        info!(
            min = config.pool_min,
            max = config.pool_max,
            "Database pool initialized"
        );
        Ok(Self::new(
            Arc::new(source),
            config.pool_max,
            config.acquire_timeout_duration(),
        ))
    }

    /// Check out one connection, waiting up to the acquire timeout.
    pub async fn acquire(&self) -> BotResult<PooledConnection> {
        let checkout = async {
            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| BotError::connection_lost("Connection pool is closed"))?;
            let conn = self.source.acquire().await?;
            Ok::<_, BotError>((permit, conn))
        };

        let (permit, conn) = tokio::time::timeout(self.acquire_timeout, checkout)
            .await
            .map_err(|_| {
                BotError::connection_lost(format!(
                    "Timed out after {}s waiting for a pooled connection",
                    self.acquire_timeout.as_secs()
                ))
            })??;

        self.stats.checkouts.fetch_add(1, Ordering::SeqCst);
        debug!(in_use = self.snapshot().in_use(), "Connection checked out");

        Ok(PooledConnection {
            conn,
            stats: Arc::clone(&self.stats),
            _permit: permit,
        })
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            checkouts: self.stats.checkouts.load(Ordering::SeqCst),
            releases: self.stats.releases.load(Ordering::SeqCst),
            max_connections: self.max_connections,
        }
    }

    /// Stop handing out connections and close the underlying source.
    pub async fn close(&self) {
        self.permits.close();
        self.source.close().await;
        info!("Database connections closed");
    }
}

/// RAII guard for a checked-out connection.
///
/// Dropping the guard returns the connection to its source and counts one
/// release, whether the query succeeded, failed, or the future was dropped.
pub struct PooledConnection {
    conn: Box<dyn SqlConnection>,
    stats: Arc<PoolStats>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = dyn SqlConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref()
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// PostgreSQL source
// =============================================================================

/// Connection source backed by sqlx's `PgPool`.
#[derive(Debug, Clone)]
pub struct PgConnectionSource {
    pool: PgPool,
}

impl PgConnectionSource {
    pub async fn connect(config: &Config) -> BotResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.pool_min)
            .max_connections(config.pool_max)
            .acquire_timeout(config.acquire_timeout_duration())
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await
            .map_err(|e| BotError::connection_lost(format!("Database setup failed: {}", e)))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ConnectionSource for PgConnectionSource {
    async fn acquire(&self) -> BotResult<Box<dyn SqlConnection>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSqlConnection { conn }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct PgSqlConnection {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl SqlConnection for PgSqlConnection {
    async fn begin_read_only(&mut self, statement_timeout: Duration) -> BotResult<()> {
        (&mut *self.conn).execute("BEGIN READ ONLY").await?;
        let set_timeout = format!(
            "SET LOCAL statement_timeout = {}",
            statement_timeout.as_millis()
        );
        (&mut *self.conn).execute(set_timeout.as_str()).await?;
        Ok(())
    }

    async fn fetch_all(&mut self, sql: &str) -> BotResult<RawResultSet> {
        // &str runs over the simple query protocol, so values arrive as text
        let rows = (&mut *self.conn).fetch_all(sql).await?;
        Ok(types::result_set(&rows))
    }

    async fn commit(&mut self) -> BotResult<()> {
        (&mut *self.conn).execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> BotResult<()> {
        if let Err(e) = (&mut *self.conn).execute("ROLLBACK").await {
            warn!(error = %e, "Rollback failed");
            return Err(e.into());
        }
        Ok(())
    }

    fn discard(&mut self) {
        self.conn.close_on_drop();
    }
}
