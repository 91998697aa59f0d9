use std::sync::Arc;
use std::time::Duration;

use ai::{ToolSpec, Value, create_tool, json};
use async_trait::async_trait;
use db::Database;

use super::{Tool, required_str, with_timeout};
use crate::catalog::CatalogMetadata;
use crate::error::ToolError;
use crate::render::table_description;

/// Describes columns, foreign keys and a few sample rows of the requested tables.
#[derive(Debug)]
pub struct DescribeTableTool {
    spec: ToolSpec,
    database: Arc<dyn Database>,
    metadata: Arc<CatalogMetadata>,
    sample_rows: usize,
    timeout: Duration,
}

impl DescribeTableTool {
    pub fn new(
        database: Arc<dyn Database>,
        metadata: Arc<CatalogMetadata>,
        sample_rows: usize,
        timeout: Duration,
    ) -> Self {
        let spec = create_tool(
            "describe_table",
            "Get the schema and sample rows for the specified tables. Be sure the tables \
             exist by calling list_tables first.",
            json!({
                "type": "object",
                "properties": {
                    "table_names": {
                        "type": "string",
                        "description": "Comma-separated list of table names, for example: orders, customers",
                    },
                },
                "required": ["table_names"],
            }),
        );
        Self {
            spec,
            database,
            metadata,
            sample_rows,
            timeout,
        }
    }

    async fn describe(&self, table: &str) -> Result<String, ToolError> {
        let schema = with_timeout(self.timeout, self.database.describe_table(table)).await?;

        if self.sample_rows == 0 {
            return Ok(table_description(&schema, Err("disabled")));
        }

        let dialect = self.database.dialect();
        let sample_query = format!(
            "SELECT * FROM {} LIMIT {}",
            dialect.quote_identifier(table),
            self.sample_rows
        );
        let sample = with_timeout(self.timeout, self.database.get_results(&sample_query)).await;

        Ok(match &sample {
            Ok(rows) => table_description(&schema, Ok(rows)),
            Err(err) => {
                tracing::warn!(table, error = %err, "could not fetch sample rows");
                table_description(&schema, Err(&err.to_string()))
            }
        })
    }
}

#[async_trait]
impl Tool for DescribeTableTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &Value) -> Result<String, ToolError> {
        let requested = required_str(args, "table_names")?;

        let mut tables: Vec<&str> = Vec::new();
        let mut unknown: Vec<&str> = Vec::new();
        for name in requested.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match self.metadata.resolve_table(name) {
                Some(table) if !tables.contains(&table) => tables.push(table),
                Some(_) => {}
                None => unknown.push(name),
            }
        }

        if !unknown.is_empty() {
            return Err(ToolError::Validation(format!(
                "unknown table(s): {}. Available tables: {}",
                unknown.join(", "),
                self.metadata.tables.join(", ")
            )));
        }
        if tables.is_empty() {
            return Err(ToolError::Validation(
                "`table_names` did not contain any table name".to_string(),
            ));
        }

        let mut sections = Vec::with_capacity(tables.len());
        for table in tables {
            sections.push(self.describe(table).await?);
        }
        Ok(sections.join("\n"))
    }
}
