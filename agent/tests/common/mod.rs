#![allow(dead_code, unreachable_pub)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent::{AgentLoop, CatalogSettings, LoopSettings, ToolCatalog};
use ai::ReasoningModel;
use ai::json;
use async_trait::async_trait;
use db::{ColumnInfo, Database, DatabaseResult, DbError, Dialect, ForeignKey, TableSchema};

/// In-memory database that answers canned queries and records every statement it sees.
#[derive(Debug, Default)]
pub struct FakeDatabase {
    tables: Vec<String>,
    results: Vec<(String, Result<DatabaseResult, DbError>)>,
    explain_errors: Vec<(String, DbError)>,
    dialect: Option<Dialect>,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
    explains: Mutex<Vec<String>>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self {
            tables: vec!["customers".to_string(), "orders".to_string()],
            ..Self::default()
        }
    }

    /// Queries containing `needle` get `result`.
    pub fn with_result(mut self, needle: &str, result: Result<DatabaseResult, DbError>) -> Self {
        self.results.push((needle.to_string(), result));
        self
    }

    pub fn with_explain_error(mut self, needle: &str, error: DbError) -> Self {
        self.explain_errors.push((needle.to_string(), error));
        self
    }

    /// Reports `dialect` instead of `PostgreSQL`.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Every query and `EXPLAIN` takes `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn stall(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn explains(&self) -> Vec<String> {
        self.explains.lock().unwrap().clone()
    }
}

#[async_trait]
impl Database for FakeDatabase {
    fn dialect(&self) -> Dialect {
        self.dialect.unwrap_or(Dialect::Postgres)
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        Ok(self.tables.clone())
    }

    async fn describe_table(&self, table: &str) -> Result<TableSchema, DbError> {
        let mut columns = vec![ColumnInfo {
            name: "id".to_string(),
            data_type: "integer".to_string(),
            nullable: false,
        }];
        let mut references = vec![];
        match table {
            "orders" => {
                columns.push(ColumnInfo {
                    name: "customer_id".to_string(),
                    data_type: "integer".to_string(),
                    nullable: true,
                });
                references.push(ForeignKey {
                    column: "customer_id".to_string(),
                    referenced_table: "customers".to_string(),
                    referenced_column: "id".to_string(),
                });
            }
            "customers" => columns.push(ColumnInfo {
                name: "name".to_string(),
                data_type: "text".to_string(),
                nullable: false,
            }),
            other => return Err(DbError::UnknownTable(other.to_string())),
        }
        Ok(TableSchema {
            name: table.to_string(),
            columns,
            references,
        })
    }

    async fn get_results(&self, query: &str) -> Result<DatabaseResult, DbError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.stall().await;
        self.results
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map_or_else(|| Ok(DatabaseResult::default()), |(_, result)| result.clone())
    }

    async fn explain(&self, query: &str) -> Result<(), DbError> {
        self.explains.lock().unwrap().push(query.to_string());
        self.stall().await;
        match self
            .explain_errors
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
        {
            Some((_, error)) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn close(&self) {}
}

/// A single `count` column holding `n`.
pub fn count_result(n: i64) -> DatabaseResult {
    DatabaseResult {
        headers: vec![("count".to_string(), "INT8".to_string())],
        rows: vec![vec![json!(n)]],
    }
}

pub fn settings() -> CatalogSettings {
    CatalogSettings {
        sample_rows: 2,
        max_result_chars: 4000,
        query_timeout: Duration::from_secs(5),
        include_tables: vec![],
        ignore_tables: vec![],
    }
}

pub async fn catalog(database: Arc<FakeDatabase>) -> Arc<ToolCatalog> {
    Arc::new(ToolCatalog::build(database, &settings()).await.unwrap())
}

pub async fn agent_loop(
    model: Arc<dyn ReasoningModel>,
    database: Arc<FakeDatabase>,
    max_iterations: usize,
) -> AgentLoop {
    AgentLoop::new(
        model,
        catalog(database).await,
        LoopSettings::new(max_iterations, "You answer questions about a test database."),
    )
}
