use std::sync::Arc;

use ai::{ToolSpec, Value, create_tool, json};
use async_trait::async_trait;

use super::Tool;
use crate::catalog::CatalogMetadata;
use crate::error::ToolError;

/// Lists the tables captured when the catalog was built.
#[derive(Debug)]
pub struct ListTablesTool {
    spec: ToolSpec,
    metadata: Arc<CatalogMetadata>,
}

impl ListTablesTool {
    pub fn new(metadata: Arc<CatalogMetadata>) -> Self {
        let spec = create_tool(
            "list_tables",
            "List the tables in the database. Takes no arguments and returns a \
             comma-separated list of table names.",
            json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        );
        Self { spec, metadata }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &Value) -> Result<String, ToolError> {
        match args {
            Value::Null | Value::Object(_) => {}
            Value::String(s) if s.trim().is_empty() => {}
            other => {
                return Err(ToolError::Validation(format!(
                    "list_tables takes no arguments, got: {other}"
                )));
            }
        }

        if self.metadata.tables.is_empty() {
            return Ok("No tables are available.".to_string());
        }
        Ok(self.metadata.tables.join(", "))
    }
}
