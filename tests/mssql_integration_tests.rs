//! SQL Server Integration Tests
//!
//! Require a running SQL Server. Connection settings come from `DBKIT_TEST_MSSQL_*`
//! environment variables (HOST, PORT, USER, PASSWORD, DATABASE).

#![cfg(feature = "mssql")]

use dbkit::database::{
    batch_delete_tables, connection_test, query_db, DatabaseConfig, DatabaseEngine,
    DatabaseEngineBuilder, DatabaseError, NetworkConnectionInfo, Query, QueryResult, Value,
};
use std::sync::Arc;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(format!("DBKIT_TEST_MSSQL_{}", key)).unwrap_or_else(|_| default.to_string())
}

/// Helper function to create test engine
fn create_test_engine() -> Arc<dyn DatabaseEngine> {
    let port = env_or("PORT", "1433").parse().unwrap();
    let info = NetworkConnectionInfo::new(
        env_or("HOST", "127.0.0.1"),
        env_or("USER", "sa"),
        env_or("PASSWORD", "YourStrong!Passw0rd"),
        env_or("DATABASE", "master"),
    )
    .with_port(port)
    .with_option("trust_cert", "true");
    DatabaseEngineBuilder::build(&DatabaseConfig::Mssql(info)).unwrap()
}

async fn reset_table(engine: &dyn DatabaseEngine, table: &str) {
    query_db(engine, &Query::new(format!("DROP TABLE IF EXISTS {}", table)))
        .await
        .unwrap();
    query_db(
        engine,
        &Query::new(format!(
            "CREATE TABLE {} (id INT PRIMARY KEY, name NVARCHAR(64))",
            table
        )),
    )
    .await
    .unwrap();
}

async fn count(engine: &dyn DatabaseEngine, table: &str) -> i64 {
    query_db(engine, &Query::new(format!("SELECT COUNT(*) FROM {}", table)).one())
        .await
        .unwrap()
        .row()
        .and_then(|r| r.get_index(0))
        .and_then(Value::as_i64)
        .unwrap()
}

#[tokio::test]
#[ignore] // Requires running SQL Server
async fn test_mssql_connection_test() {
    let engine = create_test_engine();
    assert!(connection_test(engine.as_ref()).await);
}

#[tokio::test]
async fn test_mssql_connection_test_unreachable() {
    let info = NetworkConnectionInfo::new("127.0.0.1", "sa", "wrong", "master").with_port(1);
    let engine = DatabaseEngineBuilder::build(&DatabaseConfig::Mssql(info)).unwrap();
    assert!(!connection_test(engine.as_ref()).await);
}

#[tokio::test]
#[ignore] // Requires running SQL Server
async fn test_mssql_write_then_read() {
    let engine = create_test_engine();
    reset_table(engine.as_ref(), "dbkit_rw").await;

    let insert = Query::new("INSERT INTO dbkit_rw (id, name) VALUES (@P1, @P2)")
        .many((1..=3).map(|i| vec![Value::Int(i), Value::from(format!("n{}", i))]));
    let result = query_db(engine.as_ref(), &insert).await.unwrap();
    assert_eq!(result, QueryResult::Affected(3));

    let row = query_db(
        engine.as_ref(),
        &Query::new("SELECT name FROM dbkit_rw WHERE id = @P1").bind([2]).one(),
    )
    .await
    .unwrap();
    assert_eq!(
        row.row().and_then(|r| r.get("name")),
        Some(&Value::String("n2".to_string()))
    );

    let none = query_db(
        engine.as_ref(),
        &Query::new("SELECT name FROM dbkit_rw WHERE id = @P1").bind([99]).one(),
    )
    .await
    .unwrap();
    assert_eq!(none, QueryResult::Row(None));
}

#[tokio::test]
#[ignore] // Requires running SQL Server
async fn test_mssql_rollback_on_constraint_violation() {
    let engine = create_test_engine();
    reset_table(engine.as_ref(), "dbkit_rollback").await;

    let insert = Query::new("INSERT INTO dbkit_rollback (id) VALUES (@P1)").many([[1], [2], [1]]);
    let err = query_db(engine.as_ref(), &insert).await.unwrap_err();

    assert!(matches!(err, DatabaseError::QueryFailed(_)));
    assert_eq!(count(engine.as_ref(), "dbkit_rollback").await, 0);
}

#[tokio::test]
#[ignore] // Requires running SQL Server
async fn test_mssql_batch_delete() {
    let engine = create_test_engine();
    reset_table(engine.as_ref(), "dbkit_batch").await;

    let insert =
        Query::new("INSERT INTO dbkit_batch (id) VALUES (@P1)").many((0..2500).map(|i| [i]));
    query_db(engine.as_ref(), &insert).await.unwrap();

    let report = batch_delete_tables(engine.as_ref(), "dbkit_batch", 1000)
        .await
        .unwrap();
    assert_eq!(report.batches, vec![1000, 1000, 500]);
    assert_eq!(report.total_deleted, 2500);
    assert_eq!(count(engine.as_ref(), "dbkit_batch").await, 0);
}
