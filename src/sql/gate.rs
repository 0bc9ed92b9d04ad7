//! Read-only gate for model-generated SQL.
//!
//! A statement passes only when it parses as exactly one data-retrieval query
//! AND its raw text contains none of the mutating keywords in [`DENYLIST`].
//! The keyword scan runs on the whole text, so a SELECT that merely mentions
//! one of these words (in a literal or alias) is rejected as well.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) with the PostgreSQL dialect.

use crate::error::{BotError, BotResult};
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use tracing::warn;

/// Keywords that are never allowed anywhere in the SQL text.
pub const DENYLIST: [&str; 6] = ["DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "TRUNCATE"];

/// User-facing message for rejected statements.
pub const REJECTED_MESSAGE: &str = "Only SELECT queries are allowed (no CREATE, DROP, etc)";

/// Why a statement was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    ParseError(String),
    Empty,
    MultipleStatements(usize),
    NotSelect(&'static str),
    DeniedKeyword(&'static str),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseError(e) => write!(f, "failed to parse SQL: {}", e),
            Self::Empty => write!(f, "no SQL statement found"),
            Self::MultipleStatements(n) => write!(f, "expected one statement, found {}", n),
            Self::NotSelect(kind) => write!(f, "not a SELECT statement ({})", kind),
            Self::DeniedKeyword(kw) => write!(f, "contains denied keyword {}", kw),
        }
    }
}

/// Returns true when `sql` may be executed.
///
/// # Examples
///
/// ```
/// use slack_sql_bot::sql::gate::is_safe;
///
/// assert!(is_safe("SELECT region, SUM(revenue) FROM sales_daily GROUP BY region;"));
/// assert!(!is_safe("DROP TABLE sales_daily"));
/// ```
pub fn is_safe(sql: &str) -> bool {
    match classify(sql) {
        Ok(()) => true,
        Err(rejection) => {
            warn!(reason = %rejection, "Rejected SQL");
            false
        }
    }
}

/// Like [`is_safe`], but returns a validation error carrying the reason.
pub fn check(sql: &str) -> BotResult<()> {
    classify(sql).map_err(|rejection| {
        warn!(reason = %rejection, "Rejected SQL");
        BotError::validation(
            format!("Query validation failed: {}", rejection),
            REJECTED_MESSAGE,
        )
    })
}

/// Classify a SQL string, returning the first reason it is unsafe.
pub fn classify(sql: &str) -> Result<(), Rejection> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| Rejection::ParseError(e.to_string()))?;

    let statement = match statements.as_slice() {
        [] => return Err(Rejection::Empty),
        [single] => single,
        many => return Err(Rejection::MultipleStatements(many.len())),
    };

    match statement {
        Statement::Query(query) => {
            if !is_read_only_body(&query.body) {
                return Err(Rejection::NotSelect("data-modifying query"));
            }
        }
        Statement::Insert { .. } => return Err(Rejection::NotSelect("INSERT")),
        Statement::Update { .. } => return Err(Rejection::NotSelect("UPDATE")),
        Statement::Delete { .. } => return Err(Rejection::NotSelect("DELETE")),
        Statement::Drop { .. } => return Err(Rejection::NotSelect("DROP")),
        Statement::Truncate { .. } => return Err(Rejection::NotSelect("TRUNCATE")),
        Statement::CreateTable { .. } => return Err(Rejection::NotSelect("CREATE TABLE")),
        Statement::AlterTable { .. } => return Err(Rejection::NotSelect("ALTER TABLE")),
        _ => return Err(Rejection::NotSelect("other")),
    }

    let upper = sql.to_uppercase();
    if let Some(keyword) = DENYLIST.iter().find(|kw| upper.contains(*kw)) {
        return Err(Rejection::DeniedKeyword(keyword));
    }

    Ok(())
}

/// SELECT, set operations, VALUES and TABLE are read-only; SELECT INTO is not.
fn is_read_only_body(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_none(),
        SetExpr::Query(query) => is_read_only_body(&query.body),
        SetExpr::SetOperation { left, right, .. } => {
            is_read_only_body(left) && is_read_only_body(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_ok() {
        assert!(is_safe("SELECT * FROM sales_daily"));
        assert!(is_safe("SELECT SUM(revenue) AS total FROM sales_daily;"));
    }

    #[test]
    fn test_denied_statements() {
        assert!(!is_safe("DROP TABLE sales_daily"));
        assert!(!is_safe("delete from sales_daily"));
        assert!(!is_safe("UPDATE sales_daily SET revenue = 0"));
        assert!(!is_safe("INSERT INTO sales_daily (region) VALUES ('x')"));
        assert!(!is_safe("alter table sales_daily add column x int"));
        assert!(!is_safe("TRUNCATE sales_daily"));
    }

    #[test]
    fn test_create_is_not_select() {
        assert_eq!(
            classify("CREATE TABLE t (id INT)"),
            Err(Rejection::NotSelect("CREATE TABLE"))
        );
    }

    #[test]
    fn test_empty_and_garbage() {
        assert!(!is_safe(""));
        assert!(!is_safe(";"));
        assert!(!is_safe("this is not sql"));
    }

    #[test]
    fn test_multiple_statements_rejected() {
        assert_eq!(
            classify("SELECT 1; SELECT 2;"),
            Err(Rejection::MultipleStatements(2))
        );
    }

    #[test]
    fn test_keyword_inside_literal_rejected() {
        // Conservative on purpose: the scan ignores SQL structure.
        assert_eq!(
            classify("SELECT 'update log' AS note FROM sales_daily"),
            Err(Rejection::DeniedKeyword("UPDATE"))
        );
    }

    #[test]
    fn test_select_into_rejected() {
        assert!(!is_safe("SELECT * INTO backup FROM sales_daily"));
    }

    #[test]
    fn test_check_returns_validation_error() {
        let err = check("DROP TABLE sales_daily").unwrap_err();
        assert!(matches!(err, BotError::Validation { .. }));
        assert_eq!(err.user_message(), REJECTED_MESSAGE);
    }

    #[test]
    fn test_union_and_cte_allowed() {
        assert!(is_safe(
            "SELECT region FROM sales_daily UNION ALL SELECT category FROM sales_daily"
        ));
        assert!(is_safe(
            "WITH t AS (SELECT region, revenue FROM sales_daily) SELECT region, SUM(revenue) FROM t GROUP BY region"
        ));
    }
}
