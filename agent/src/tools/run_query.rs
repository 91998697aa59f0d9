use std::sync::Arc;
use std::time::Duration;

use ai::{ToolSpec, Value, create_tool};
use async_trait::async_trait;
use db::Database;
use db::guard::ensure_read_only;

use super::{Tool, query_parameters, required_str, statement_text, with_timeout};
use crate::error::ToolError;
use crate::render::result_table;

/// Runs one read-only query and renders its rows as a text table.
#[derive(Debug)]
pub struct RunQueryTool {
    spec: ToolSpec,
    database: Arc<dyn Database>,
    timeout: Duration,
    max_result_chars: usize,
}

impl RunQueryTool {
    pub fn new(database: Arc<dyn Database>, timeout: Duration, max_result_chars: usize) -> Self {
        let spec = create_tool(
            "run_query",
            "Execute a single read-only SQL query against the database and return the \
             resulting rows. If the query is not correct an error message is returned; \
             rewrite the query, check it, and try again. Unknown column errors mean you \
             should describe the table first.",
            query_parameters(),
        );
        Self {
            spec,
            database,
            timeout,
            max_result_chars,
        }
    }
}

#[async_trait]
impl Tool for RunQueryTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &Value) -> Result<String, ToolError> {
        let query = statement_text(required_str(args, "query")?);
        let normalised = ensure_read_only(self.database.dialect(), query)?;

        let result = with_timeout(self.timeout, self.database.get_results(&normalised)).await?;
        tracing::debug!(rows = result.rows.len(), "query returned");

        Ok(result_table(&result, self.max_result_chars))
    }
}
