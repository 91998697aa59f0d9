mod common;

use std::sync::Arc;
use std::time::Duration;

use agent::{CatalogSettings, ToolCatalog, ToolError};
use ai::{ToolCallInfo, Value, json};
use common::{FakeDatabase, count_result};
use db::{DbError, Dialect};

fn call(name: &str, arguments: Value) -> ToolCallInfo {
    ToolCallInfo {
        id: ai::new_call_id(),
        name: name.to_string(),
        arguments,
    }
}

#[tokio::test]
async fn lists_the_same_tools_every_time() {
    let catalog = common::catalog(Arc::new(FakeDatabase::new())).await;

    let first = catalog.list().to_vec();
    let second = catalog.list().to_vec();
    assert_eq!(first, second);
    assert_eq!(
        catalog.names(),
        vec!["list_tables", "describe_table", "check_query", "run_query"]
    );
}

#[tokio::test]
async fn list_tables_returns_startup_tables() {
    let catalog = common::catalog(Arc::new(FakeDatabase::new())).await;

    let output = catalog.execute(&call("list_tables", json!({}))).await.unwrap();
    assert_eq!(output, "customers, orders");
}

#[tokio::test]
async fn ignored_tables_are_hidden() {
    let database = Arc::new(FakeDatabase::new());
    let settings = CatalogSettings {
        ignore_tables: vec!["CUSTOMERS".to_string()],
        ..common::settings()
    };
    let catalog = ToolCatalog::build(database, &settings).await.unwrap();

    assert_eq!(catalog.metadata().tables, vec!["orders".to_string()]);
    let err = catalog
        .execute(&call("describe_table", json!({ "table_names": "customers" })))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Validation(msg) if msg.contains("customers")));
}

#[tokio::test]
async fn describe_table_shows_columns_keys_and_samples() {
    let database = Arc::new(FakeDatabase::new());
    let catalog = common::catalog(Arc::clone(&database)).await;

    let output = catalog
        .execute(&call("describe_table", json!({ "table_names": "Orders, orders" })))
        .await
        .unwrap();

    assert!(output.contains("Table: orders"));
    assert!(output.contains("customer_id integer NULL"));
    assert!(output.contains("customer_id -> customers.id"));
    assert_eq!(database.queries(), vec![r#"SELECT * FROM "orders" LIMIT 2"#]);
}

#[tokio::test]
async fn describe_table_rejects_unknown_tables() {
    let database = Arc::new(FakeDatabase::new());
    let catalog = common::catalog(Arc::clone(&database)).await;

    let err = catalog
        .execute(&call("describe_table", json!({ "table_names": "orders, invoices" })))
        .await
        .unwrap_err();

    let ToolError::Validation(message) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert!(message.contains("invoices"));
    assert!(message.contains("Available tables: customers, orders"));
    assert!(database.queries().is_empty());
}

#[tokio::test]
async fn run_query_renders_rows() {
    let database =
        Arc::new(FakeDatabase::new().with_result("COUNT(*)", Ok(count_result(42))));
    let catalog = common::catalog(Arc::clone(&database)).await;

    let output = catalog
        .execute(&call("run_query", json!({ "query": "SELECT COUNT(*) FROM orders;" })))
        .await
        .unwrap();

    assert!(output.starts_with("1 row"));
    assert!(output.contains("42"));
    assert_eq!(database.queries(), vec!["SELECT COUNT(*) FROM orders"]);
}

#[tokio::test]
async fn mutating_statements_never_reach_the_database() {
    let database = Arc::new(FakeDatabase::new());
    let catalog = common::catalog(Arc::clone(&database)).await;

    for query in [
        "DELETE FROM orders",
        "INSERT INTO orders (id) VALUES (1)",
        "UPDATE orders SET id = 2",
        "DROP TABLE orders",
        "SELECT 1; DROP TABLE orders",
    ] {
        for tool in ["run_query", "check_query"] {
            let err = catalog
                .execute(&call(tool, json!({ "query": query })))
                .await
                .unwrap_err();
            assert!(
                matches!(err, ToolError::Validation(_)),
                "{tool} accepted {query}: {err:?}"
            );
        }
    }
    assert!(database.queries().is_empty());
    assert!(database.explains().is_empty());
}

#[tokio::test]
async fn only_the_checked_statement_is_sent() {
    let database = Arc::new(FakeDatabase::new());
    let catalog = common::catalog(Arc::clone(&database)).await;

    catalog
        .execute(&call(
            "run_query",
            json!({ "query": "SELECT id /* newest first */ FROM orders -- ORDER BY id DESC" }),
        ))
        .await
        .unwrap();
    catalog
        .execute(&call("check_query", json!({ "query": "select id from orders; " })))
        .await
        .unwrap();

    assert_eq!(database.queries(), vec!["SELECT id FROM orders"]);
    assert_eq!(database.explains(), vec!["SELECT id FROM orders"]);
}

#[tokio::test]
async fn mysql_executable_comments_never_reach_the_database() {
    let database = Arc::new(FakeDatabase::new().with_dialect(Dialect::MySql));
    let catalog = common::catalog(Arc::clone(&database)).await;

    for query in [
        "SELECT 1 /*! INTO OUTFILE '/tmp/x' */",
        "SELECT 1 /*!; DELETE FROM orders */",
    ] {
        for tool in ["run_query", "check_query"] {
            let err = catalog
                .execute(&call(tool, json!({ "query": query })))
                .await
                .unwrap_err();
            assert!(
                matches!(err, ToolError::Validation(_)),
                "{tool} accepted {query}: {err:?}"
            );
        }
    }
    assert!(database.queries().is_empty());
    assert!(database.explains().is_empty());
}

#[tokio::test]
async fn slow_queries_time_out_as_execution_errors() {
    let database = Arc::new(FakeDatabase::new().with_delay(Duration::from_secs(5)));
    let settings = CatalogSettings {
        query_timeout: Duration::from_millis(20),
        ..common::settings()
    };
    let catalog = ToolCatalog::build(database, &settings).await.unwrap();

    let err = catalog
        .execute(&call("run_query", json!({ "query": "SELECT id FROM orders" })))
        .await
        .unwrap_err();

    let ToolError::Execution(message) = err else {
        panic!("expected an execution error, got {err:?}");
    };
    assert_eq!(message, "the database did not answer within 20ms");
}

#[tokio::test]
async fn database_errors_become_tool_errors() {
    let database = Arc::new(
        FakeDatabase::new()
            .with_result(
                "missing_column",
                Err(DbError::Execution("column \"missing_column\" does not exist".to_string())),
            )
            .with_result("weird_syntax", Err(DbError::Syntax("syntax error at or near".to_string()))),
    );
    let catalog = common::catalog(database).await;

    let err = catalog
        .execute(&call("run_query", json!({ "query": "SELECT missing_column FROM orders" })))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Execution(_)));
    assert!(err.to_string().starts_with("ExecutionError: "));

    let err = catalog
        .execute(&call("run_query", json!({ "query": "SELECT weird_syntax FROM orders" })))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::QuerySyntax(_)));
}

#[tokio::test]
async fn check_query_explains_without_running() {
    let database = Arc::new(
        FakeDatabase::new()
            .with_explain_error("nope", DbError::Syntax("relation \"nope\" does not exist".to_string())),
    );
    let catalog = common::catalog(Arc::clone(&database)).await;

    let output = catalog
        .execute(&call("check_query", json!({ "query": "SELECT id FROM orders" })))
        .await
        .unwrap();
    assert!(output.starts_with("The query is valid PostgreSQL"));

    let err = catalog
        .execute(&call("check_query", json!({ "query": "SELECT id FROM nope" })))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::QuerySyntax(_)));

    let err = catalog
        .execute(&call("check_query", json!({ "query": "SELEC id FROM orders" })))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::QuerySyntax(_)));

    assert_eq!(database.explains().len(), 2);
    assert!(database.queries().is_empty());
}

#[tokio::test]
async fn rejects_bad_arguments_and_unknown_tools() {
    let catalog = common::catalog(Arc::new(FakeDatabase::new())).await;

    for (tool, arguments) in [
        ("run_query", json!({})),
        ("run_query", json!({ "query": 7 })),
        ("run_query", json!("not json at all")),
        ("describe_table", json!({ "table_names": " , " })),
        ("list_tables", json!([1, 2])),
    ] {
        let err = catalog.execute(&call(tool, arguments)).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)), "{tool}: {err:?}");
    }

    let err = catalog
        .execute(&call("drop_everything", json!({})))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "ValidationError: unknown tool `drop_everything`. Available tools: \
         list_tables, describe_table, check_query, run_query"
    );
}
