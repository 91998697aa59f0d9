use crate::{
    ColumnInfo, Database, DatabaseResult, DbError, Dialect, ForeignKey, PoolSettings, TableSchema,
};

use serde_json::{Value, json};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};

#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Database for PostgresDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(
            r#"SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema()
              AND table_type IN ('BASE TABLE', 'VIEW')
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
                c.column_name::text,
                c.udt_name::text AS pg_type,
                c.is_nullable::text
            FROM information_schema.columns c
            WHERE c.table_schema = current_schema()
              AND c.table_name = $1
            ORDER BY c.ordinal_position"#,
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
            r#"
                SELECT
                    kcu.column_name::text AS referencing_column,
                    ccu.table_name::text AS referenced_table,
                    ccu.column_name::text AS referenced_column
                FROM
                    information_schema.table_constraints AS tc
                JOIN information_schema.key_column_usage AS kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                JOIN information_schema.constraint_column_usage AS ccu
                    ON ccu.constraint_name = tc.constraint_name
                    AND ccu.table_schema = tc.table_schema
                WHERE tc.constraint_type = 'FOREIGN KEY'
                  AND tc.table_schema = current_schema()
                  AND tc.table_name = $1;
                "#,
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
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;

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

fn to_result(rows: &[PgRow]) -> DatabaseResult {
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

fn decode(row: &PgRow, i: usize, type_name: &str) -> Value {
    match type_name {
        "UUID" => row
            .try_get::<uuid::Uuid, _>(i)
            .map(|v| json!(v.to_string()))
            .unwrap_or(Value::Null),

        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
            .try_get::<String, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(i)
            .map(|v| json!(v.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),

        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(i)
            .map(|v| json!(v.format("%H:%M:%S").to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(i)
            .map(|dt| json!(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
            .map(|dt| json!(dt.to_rfc3339()))
            .unwrap_or(Value::Null),

        "INT2" => row
            .try_get::<i16, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "INT4" => row
            .try_get::<i32, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "INT8" => row
            .try_get::<i64, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "FLOAT4" => row
            .try_get::<f32, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "FLOAT8" => row
            .try_get::<f64, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "NUMERIC" => row
            .try_get::<rust_decimal::Decimal, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        "JSON" | "JSONB" => row.try_get::<Value, _>(i).unwrap_or(Value::Null),

        "BOOL" => row
            .try_get::<bool, _>(i)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),

        _ => row
            .try_get_raw(i)
            .ok()
            .and_then(|raw| raw.as_bytes().ok().map(String::from_utf8_lossy))
            .map_or(Value::Null, |s| Value::String(s.into_owned())),
    }
}
