//! Database access layer.
//!
//! - Connection pool with checkout/release accounting
//! - Read-only query execution
//! - PostgreSQL row decoding

pub mod executor;
pub mod mock;
pub mod pool;
pub mod types;

pub use executor::QueryExecutor;
pub use mock::{MockBehavior, MockConnectionSource};
pub use pool::{
    ConnectionPool, ConnectionSource, PgConnectionSource, PoolSnapshot, PooledConnection,
    SqlConnection,
};
