use crate::{
    ColumnInfo, Database, DatabaseResult, DbError, Dialect, ForeignKey, PoolSettings, TableSchema,
};

use serde_json::{Value, json};
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Executor, MySqlPool, Row, TypeInfo};

#[derive(Debug, Clone)]
pub struct MySqlDatabase {
    pool: MySqlPool,
}

impl MySqlDatabase {
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self, DbError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            // MySQL cannot change the access mode of a transaction after it starts
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                    Ok(())
                })
            })
            .connect(url)
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Database for MySqlDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        // information_schema columns come back as binary strings on some servers
        let rows = sqlx::query(
            r#"SELECT CAST(table_name AS CHAR) AS table_name
            FROM information_schema.tables
            WHERE table_schema = DATABASE()
            ORDER BY table_name"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(DbError::from))
            .collect()
    }

    async fn describe_table(&self, table: &str) -> Result<TableSchema, DbError> {
        let columns = sqlx::query(
            r#"SELECT
                CAST(column_name AS CHAR) AS column_name,
                CAST(column_type AS CHAR) AS column_type,
                CAST(is_nullable AS CHAR) AS is_nullable
            FROM information_schema.columns
            WHERE table_schema = DATABASE()
              AND table_name = ?
            ORDER BY ordinal_position"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        if columns.is_empty() {
            return Err(DbError::UnknownTable(table.to_string()));
        }

        let columns = columns
            .iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                    nullable: row.try_get::<String, _>(2)? == "YES",
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let fk_rows = sqlx::query(
            r#"SELECT
                CAST(column_name AS CHAR) AS referencing_column,
                CAST(referenced_table_name AS CHAR) AS referenced_table,
                CAST(referenced_column_name AS CHAR) AS referenced_column
            FROM information_schema.key_column_usage
            WHERE table_schema = DATABASE()
              AND table_name = ?
              AND referenced_table_name IS NOT NULL"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let references = fk_rows
            .iter()
            .map(|row| {
                Ok(ForeignKey {
                    column: row.try_get("referencing_column")?,
                    referenced_table: row.try_get("referenced_table")?,
                    referenced_column: row.try_get("referenced_column")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(TableSchema {
            name: table.to_string(),
            columns,
            references,
        })
    }

    async fn get_results(&self, query: &str) -> Result<DatabaseResult, DbError> {
        // every pooled session is read-only, see `connect`
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(query).fetch_all(&mut *tx).await?;
        tx.rollback().await?;

        Ok(to_result(&rows))
    }

    async fn explain(&self, query: &str) -> Result<(), DbError> {
        let statement = format!("EXPLAIN {query}");
        sqlx::query(&statement).fetch_all(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_result(rows: &[MySqlRow]) -> DatabaseResult {
    let mut results = DatabaseResult::default();

    let Some(first) = rows.first() else {
        return results;
    };

    for col in first.columns() {
        results
            .headers
            .push((col.name().to_string(), col.type_info().name().to_string()));
    }

    for row in rows {
        let row_data = row
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| decode(row, i, col.type_info().name()))
            .collect();
        results.rows.push(row_data);
    }

    results
}

fn decode(row: &MySqlRow, i: usize, type_name: &str) -> Value {
    match type_name {
        "BOOLEAN" => row
            .try_get::<bool, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<i64, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row
            .try_get::<u64, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "FLOAT" => row
            .try_get::<f32, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "DOUBLE" => row
            .try_get::<f64, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "DECIMAL" => row
            .try_get::<rust_decimal::Decimal, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(i)
            .map(|v| json!(v.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),

        "DATETIME" => row
            .try_get::<chrono::NaiveDateTime, _>(i)
            .map(|dt| json!(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMP" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
            .map(|dt| json!(dt.to_rfc3339()))
            .unwrap_or(Value::Null),

        "JSON" => row.try_get::<Value, _>(i).unwrap_or(Value::Null),

        _ => row
            .try_get_unchecked::<Option<String>, _>(i)
            .ok()
            .or_else(|| {
                row.try_get_unchecked::<Option<Vec<u8>>, _>(i)
                    .ok()
                    .map(|bytes| bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
            })
            .flatten()
            .map_or(Value::Null, Value::String),
    }
}
