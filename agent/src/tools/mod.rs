//! The database tools exposed to the model.
//!
//! Every tool implements [`Tool`]; [`crate::ToolCatalog`] owns the fixed set and dispatches
//! calls by name.

pub mod check_query;
pub mod describe_table;
pub mod list_tables;
pub mod run_query;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use ai::{ToolSpec, Value};
use async_trait::async_trait;
use db::DbError;

use crate::error::ToolError;

pub use check_query::CheckQueryTool;
pub use describe_table::DescribeTableTool;
pub use list_tables::ListTablesTool;
pub use run_query::RunQueryTool;

#[async_trait]
pub trait Tool: Send + Sync + fmt::Debug {
    /// Name, description and argument schema shown to the model.
    fn spec(&self) -> &ToolSpec;

    async fn execute(&self, args: &Value) -> Result<String, ToolError>;
}

/// Reads a required, non-blank string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    let Value::Object(map) = args else {
        return Err(ToolError::Validation(format!(
            "arguments must be a JSON object with a `{key}` string, got: {args}"
        )));
    };
    match map.get(key) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.trim()),
        Some(Value::String(_)) => Err(ToolError::Validation(format!("`{key}` must not be empty"))),
        Some(other) => Err(ToolError::Validation(format!(
            "`{key}` must be a string, got: {other}"
        ))),
        None => Err(ToolError::Validation(format!(
            "missing required argument `{key}`"
        ))),
    }
}

/// Strips trailing semicolons so drivers see exactly one statement.
pub(crate) fn statement_text(query: &str) -> &str {
    query.trim().trim_end_matches(';').trim_end()
}

pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    operation: impl Future<Output = Result<T, DbError>>,
) -> Result<T, ToolError> {
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result.map_err(ToolError::from),
        Err(_) => Err(ToolError::Execution(format!(
            "the database did not answer within {timeout:?}"
        ))),
    }
}

pub(crate) fn query_parameters() -> Value {
    ai::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "A single read-only SQL query.",
            },
        },
        "required": ["query"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai::json;

    #[test]
    fn required_str_validates_shape() {
        assert_eq!(
            required_str(&json!({ "query": " SELECT 1 " }), "query").unwrap(),
            "SELECT 1"
        );
        for bad in [
            json!("SELECT 1"),
            json!({}),
            json!({ "query": 5 }),
            json!({ "query": "  " }),
        ] {
            assert!(matches!(
                required_str(&bad, "query"),
                Err(ToolError::Validation(_))
            ));
        }
    }

    #[test]
    fn statement_text_drops_trailing_semicolons() {
        assert_eq!(statement_text("  SELECT 1 ;; \n"), "SELECT 1");
    }
}
