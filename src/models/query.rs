//! Query-related data models.
//!
//! This module defines the SQL produced by the model and the result returned
//! by the executor.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Where a SQL statement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    ModelGenerated,
}

/// A SQL statement produced by the completion service.
///
/// Consumed by value by the executor, so one generated query runs at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery {
    pub sql: String,
    pub provenance: Provenance,
}

impl GeneratedQuery {
    pub fn model_generated(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            provenance: Provenance::ModelGenerated,
        }
    }
}

/// How many rows a result holds compared to how many the query produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Every row is present.
    Exact(usize),
    /// The result was cut down to `shown` rows out of `total`.
    Truncated { shown: usize, total: usize },
}

impl Cardinality {
    /// Describe `total` rows under a cap of `cap` rows.
    pub fn for_total(total: usize, cap: usize) -> Self {
        if total > cap {
            Self::Truncated { shown: cap, total }
        } else {
            Self::Exact(total)
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(0) => write!(f, "0 rows"),
            Self::Exact(1) => write!(f, "1 row"),
            Self::Exact(n) => write!(f, "{} rows", n),
            Self::Truncated { shown, total } => {
                write!(f, "{} of {} rows (limited)", shown, total)
            }
        }
    }
}

/// Rows fetched from the database, before the row cap is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

/// Result of an executed query, ready for formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
    pub cardinality: Cardinality,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Apply the row cap to a raw result set.
    pub fn capped(raw: RawResultSet, cap: usize, execution_time_ms: u64) -> Self {
        let RawResultSet { columns, mut rows } = raw;
        let cardinality = Cardinality::for_total(rows.len(), cap);
        rows.truncate(cap);
        Self {
            columns,
            rows,
            cardinality,
            execution_time_ms,
        }
    }

    /// The cardinality descriptor, e.g. "3 rows" or "10 of 42 rows (limited)".
    pub fn info(&self) -> String {
        self.cardinality.to_string()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
