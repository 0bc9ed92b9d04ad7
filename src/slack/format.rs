//! Slack mrkdwn rendering for query results and errors.

use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Posted when a query produced no columns.
pub const NO_RESULTS: &str = "*Results:*\n\nNo data found.";

const CELL_SEPARATOR: &str = " | ";

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    }
}

/// Render a result as a code block followed by the cardinality line.
///
/// ```
/// use serde_json::json;
/// use slack_sql_bot::slack::format::format_table;
///
/// let text = format_table(
///     &["region".to_string(), "revenue".to_string()],
///     &[vec![json!("North"), json!("1200.00")]],
///     "1 row",
/// );
/// assert_eq!(
///     text,
///     "*Results:*\n```\nregion | revenue\n----------------\nNorth | 1200.00\n```\n_1 row_"
/// );
/// ```
pub fn format_table(columns: &[String], rows: &[Vec<JsonValue>], info: &str) -> String {
    if columns.is_empty() {
        return NO_RESULTS.to_string();
    }

    let header = columns.join(CELL_SEPARATOR);
    let dashes = "-".repeat(header.width());

    let body = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(format_value)
                .collect::<Vec<_>>()
                .join(CELL_SEPARATOR)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("*Results:*\n```\n{header}\n{dashes}\n{body}\n```\n_{info}_")
}

/// Render a user-facing error message.
pub fn format_error(message: &str) -> String {
    format!("```\n⚠️ {}\n```", message)
}
