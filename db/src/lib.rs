pub mod error;
pub mod guard;
pub mod mysql;
pub mod postgres;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use error::DbError;

/// Read-only access to a SQL database.
///
/// Implementations share one connection pool across all callers; every method may be
/// called concurrently.
#[async_trait]
pub trait Database: Send + Sync + fmt::Debug {
    fn dialect(&self) -> Dialect;

    /// Names of the tables and views visible in the connected schema, sorted.
    async fn list_tables(&self) -> Result<Vec<String>, DbError>;

    /// Columns and outgoing foreign keys of one table.
    async fn describe_table(&self, table: &str) -> Result<TableSchema, DbError>;

    /// Execute a query and return results as JSON values.
    /// `headers` holds `(column_name, column_type)` pairs in select order.
    async fn get_results(&self, query: &str) -> Result<DatabaseResult, DbError>;

    /// Ask the server to plan the query without running it.
    async fn explain(&self, query: &str) -> Result<(), DbError>;

    /// Close the pool. Further calls fail.
    async fn close(&self);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatabaseResult {
    pub headers: Vec<(String, String)>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub references: Vec<ForeignKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "PostgreSQL",
            Dialect::MySql => "MySQL",
        }
    }

    pub fn quote_identifier(self, ident: &str) -> String {
        match self {
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    pub(crate) fn parser_dialect(self) -> Box<dyn sqlparser::dialect::Dialect> {
        match self {
            Dialect::Postgres => Box::new(sqlparser::dialect::PostgreSqlDialect {}),
            Dialect::MySql => Box::new(sqlparser::dialect::MySqlDialect {}),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&config::DatabaseConfig> for PoolSettings {
    fn from(conf: &config::DatabaseConfig) -> Self {
        Self {
            max_connections: conf.max_connections.max(1),
            acquire_timeout: Duration::from_secs(conf.acquire_timeout_secs),
        }
    }
}

/// Works out which backend a connection url targets. `SQLAlchemy`-style driver suffixes
/// (`mysql+mysqlconnector://`) are stripped so the same url works here.
pub fn detect_dialect(url: &str) -> Result<(Dialect, String), DbError> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(DbError::UnsupportedUrl(redact(url)));
    };
    let base = scheme.split('+').next().unwrap_or(scheme).to_ascii_lowercase();

    match base.as_str() {
        "postgres" | "postgresql" => Ok((Dialect::Postgres, format!("postgres://{rest}"))),
        "mysql" | "mariadb" => Ok((Dialect::MySql, format!("mysql://{rest}"))),
        _ => Err(DbError::UnsupportedUrl(redact(url))),
    }
}

/// Opens the process-wide pool for `url`.
pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Arc<dyn Database>, DbError> {
    let (dialect, url) = detect_dialect(url)?;
    tracing::info!(dialect = %dialect, url = %redact(&url), "connecting to database");

    let database: Arc<dyn Database> = match dialect {
        Dialect::Postgres => Arc::new(postgres::PostgresDatabase::connect(&url, settings).await?),
        Dialect::MySql => Arc::new(mysql::MySqlDatabase::connect(&url, settings).await?),
    };
    Ok(database)
}

/// Hides the password part of a connection url for logs and errors.
pub fn redact(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}
