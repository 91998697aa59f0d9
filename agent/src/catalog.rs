//! The fixed set of database tools offered to the model.

use std::sync::Arc;
use std::time::Duration;

use ai::{ToolCallInfo, ToolSpec};
use db::{Database, DbError, Dialect};

use crate::error::ToolError;
use crate::tools::{CheckQueryTool, DescribeTableTool, ListTablesTool, RunQueryTool, Tool};

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Rows fetched per table by `describe_table`. Zero disables sampling.
    pub sample_rows: usize,
    pub max_result_chars: usize,
    pub query_timeout: Duration,
    /// When non-empty, only these tables are exposed.
    pub include_tables: Vec<String>,
    pub ignore_tables: Vec<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            sample_rows: 3,
            max_result_chars: 4000,
            query_timeout: Duration::from_secs(30),
            include_tables: vec![],
            ignore_tables: vec![],
        }
    }
}

impl CatalogSettings {
    pub fn from_config(database: &config::DatabaseConfig, agent: &config::AgentConfig) -> Self {
        Self {
            sample_rows: database.sample_rows,
            max_result_chars: agent.max_result_chars,
            query_timeout: Duration::from_secs(database.query_timeout_secs.max(1)),
            include_tables: database.include_tables.clone(),
            ignore_tables: database.ignore_tables.clone(),
        }
    }
}

/// What the catalog learned about the database when it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMetadata {
    pub dialect: Dialect,
    pub tables: Vec<String>,
}

impl CatalogMetadata {
    /// Looks a table up by name, ignoring case. Hidden tables are never found.
    pub fn resolve_table(&self, name: &str) -> Option<&str> {
        let name = name.trim().trim_matches(|c| c == '"' || c == '`');
        self.tables
            .iter()
            .find(|t| t.as_str() == name)
            .or_else(|| self.tables.iter().find(|t| t.eq_ignore_ascii_case(name)))
            .map(String::as_str)
    }
}

#[derive(Debug)]
pub struct ToolCatalog {
    metadata: Arc<CatalogMetadata>,
    tools: Vec<Arc<dyn Tool>>,
    specs: Vec<ToolSpec>,
}

impl ToolCatalog {
    /// Reads the table list once and wires up the tools in a stable order.
    pub async fn build(
        database: Arc<dyn Database>,
        settings: &CatalogSettings,
    ) -> Result<Self, DbError> {
        let mut tables: Vec<String> = database
            .list_tables()
            .await?
            .into_iter()
            .filter(|t| {
                settings.include_tables.is_empty()
                    || settings.include_tables.iter().any(|i| i.eq_ignore_ascii_case(t))
            })
            .filter(|t| !settings.ignore_tables.iter().any(|i| i.eq_ignore_ascii_case(t)))
            .collect();
        tables.sort();
        tables.dedup();

        let metadata = Arc::new(CatalogMetadata {
            dialect: database.dialect(),
            tables,
        });
        tracing::info!(
            dialect = %metadata.dialect,
            tables = metadata.tables.len(),
            "tool catalog ready"
        );

        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ListTablesTool::new(Arc::clone(&metadata))),
            Arc::new(DescribeTableTool::new(
                Arc::clone(&database),
                Arc::clone(&metadata),
                settings.sample_rows,
                settings.query_timeout,
            )),
            Arc::new(CheckQueryTool::new(
                Arc::clone(&database),
                settings.query_timeout,
            )),
            Arc::new(RunQueryTool::new(
                database,
                settings.query_timeout,
                settings.max_result_chars,
            )),
        ];
        let specs = tools.iter().map(|tool| tool.spec().clone()).collect();

        Ok(Self {
            metadata,
            tools,
            specs,
        })
    }

    /// Tool descriptions in presentation order. Identical on every call.
    pub fn list(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|spec| spec.name.as_str()).collect()
    }

    pub fn metadata(&self) -> &CatalogMetadata {
        &self.metadata
    }

    pub fn dialect(&self) -> Dialect {
        self.metadata.dialect
    }

    /// Dispatches one call by name. Failures come back as [`ToolError`] so the caller can
    /// show them to the model.
    #[tracing::instrument(skip(self, call), fields(tool = %call.name, call_id = %call.id))]
    pub async fn execute(&self, call: &ToolCallInfo) -> Result<String, ToolError> {
        let Some(tool) = self.tools.iter().find(|tool| tool.spec().name == call.name) else {
            return Err(ToolError::Validation(format!(
                "unknown tool `{}`. Available tools: {}",
                call.name,
                self.names().join(", ")
            )));
        };

        let result = tool.execute(&call.arguments).await;
        match &result {
            Ok(output) => tracing::debug!(chars = output.len(), "tool succeeded"),
            Err(err) => tracing::warn!(error = %err, "tool failed"),
        }
        result
    }
}
