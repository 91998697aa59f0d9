use std::sync::Arc;
use std::time::Duration;

use ai::{ToolSpec, Value, create_tool};
use async_trait::async_trait;
use db::Database;
use db::guard::ensure_read_only;

use super::{Tool, query_parameters, required_str, statement_text, with_timeout};
use crate::error::ToolError;

/// Validates a query without running it: the read-only guard first, then the server's
/// own planner through `EXPLAIN`.
#[derive(Debug)]
pub struct CheckQueryTool {
    spec: ToolSpec,
    database: Arc<dyn Database>,
    timeout: Duration,
}

impl CheckQueryTool {
    pub fn new(database: Arc<dyn Database>, timeout: Duration) -> Self {
        let spec = create_tool(
            "check_query",
            "Check a SQL query for syntax errors and disallowed statements before running \
             it. Always use this tool before run_query.",
            query_parameters(),
        );
        Self {
            spec,
            database,
            timeout,
        }
    }
}

#[async_trait]
impl Tool for CheckQueryTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &Value) -> Result<String, ToolError> {
        let query = statement_text(required_str(args, "query")?);
        let dialect = self.database.dialect();
        let normalised = ensure_read_only(dialect, query)?;

        with_timeout(self.timeout, self.database.explain(&normalised)).await?;

        Ok(format!("The query is valid {dialect}:\n{normalised}"))
    }
}
