//! MySQL Integration Tests
//!
//! Require a running MySQL server. Connection settings come from `DBKIT_TEST_MYSQL_*`
//! environment variables (HOST, PORT, USER, PASSWORD, DATABASE).

#![cfg(feature = "mysql")]

use dbkit::database::{
    batch_delete_tables, connection_test, query_db, DatabaseConfig, DatabaseEngine,
    DatabaseEngineBuilder, DatabaseError, NetworkConnectionInfo, Query, QueryResult, Value,
};
use std::sync::Arc;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(format!("DBKIT_TEST_MYSQL_{}", key)).unwrap_or_else(|_| default.to_string())
}

/// Helper function to create test engine
fn create_test_engine() -> Arc<dyn DatabaseEngine> {
    let port = env_or("PORT", "3306").parse().unwrap();
    let info = NetworkConnectionInfo::new(
        env_or("HOST", "127.0.0.1"),
        env_or("USER", "root"),
        env_or("PASSWORD", "password"),
        env_or("DATABASE", "test_db"),
    )
    .with_port(port);
    DatabaseEngineBuilder::build(&DatabaseConfig::Mysql(info)).unwrap()
}

async fn reset_table(engine: &dyn DatabaseEngine, table: &str) {
    query_db(engine, &Query::new(format!("DROP TABLE IF EXISTS {}", table)))
        .await
        .unwrap();
    query_db(
        engine,
        &Query::new(format!(
            "CREATE TABLE {} (id INT PRIMARY KEY, name VARCHAR(64))",
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
#[ignore] // Requires running MySQL server
async fn test_mysql_connection_test() {
    let engine = create_test_engine();
    assert!(connection_test(engine.as_ref()).await);
}

#[tokio::test]
async fn test_mysql_connection_test_unreachable() {
    let info = NetworkConnectionInfo::new("127.0.0.1", "root", "wrong", "test_db").with_port(1);
    let engine = DatabaseEngineBuilder::build(&DatabaseConfig::Mysql(info)).unwrap();
    assert!(!connection_test(engine.as_ref()).await);
}

#[tokio::test]
#[ignore] // Requires running MySQL server
async fn test_mysql_write_then_read() {
    let engine = create_test_engine();
    reset_table(engine.as_ref(), "dbkit_rw").await;

    let insert = Query::new("INSERT INTO dbkit_rw (id, name) VALUES (?, ?)")
        .many((1..=3).map(|i| vec![Value::Int(i), Value::from(format!("n{}", i))]));
    let result = query_db(engine.as_ref(), &insert).await.unwrap();
    assert_eq!(result, QueryResult::Affected(3));

    let row = query_db(
        engine.as_ref(),
        &Query::new("SELECT name FROM dbkit_rw WHERE id = ?").bind([2]).one(),
    )
    .await
    .unwrap();
    assert_eq!(
        row.row().and_then(|r| r.get("name")),
        Some(&Value::String("n2".to_string()))
    );

    let none = query_db(
        engine.as_ref(),
        &Query::new("SELECT name FROM dbkit_rw WHERE id = ?").bind([99]).one(),
    )
    .await
    .unwrap();
    assert_eq!(none, QueryResult::Row(None));
}

#[tokio::test]
#[ignore] // Requires running MySQL server
async fn test_mysql_rollback_on_constraint_violation() {
    let engine = create_test_engine();
    reset_table(engine.as_ref(), "dbkit_rollback").await;

    let insert = Query::new("INSERT INTO dbkit_rollback (id) VALUES (?)").many([[1], [2], [1]]);
    let err = query_db(engine.as_ref(), &insert).await.unwrap_err();

    assert!(matches!(err, DatabaseError::QueryFailed(_)));
    assert_eq!(count(engine.as_ref(), "dbkit_rollback").await, 0);
}

#[tokio::test]
#[ignore] // Requires running MySQL server
async fn test_mysql_batch_delete() {
    let engine = create_test_engine();
    reset_table(engine.as_ref(), "dbkit_batch").await;

    let insert =
        Query::new("INSERT INTO dbkit_batch (id) VALUES (?)").many((0..2500).map(|i| [i]));
    query_db(engine.as_ref(), &insert).await.unwrap();

    let report = batch_delete_tables(engine.as_ref(), "dbkit_batch", 1000)
        .await
        .unwrap();
    assert_eq!(report.batches, vec![1000, 1000, 500]);
    assert_eq!(report.total_deleted, 2500);
    assert_eq!(count(engine.as_ref(), "dbkit_batch").await, 0);
}

#[tokio::test]
#[ignore] // Requires running MySQL server
async fn test_mysql_unparameterized_read_keeps_column_types() {
    let engine = create_test_engine();
    reset_table(engine.as_ref(), "dbkit_types").await;

    query_db(
        engine.as_ref(),
        &Query::new("INSERT INTO dbkit_types (id, name) VALUES (?, ?)")
            .bind([Value::Int(7), Value::from("seven")]),
    )
    .await
    .unwrap();

    let count = query_db(
        engine.as_ref(),
        &Query::new("SELECT COUNT(*) AS n FROM dbkit_types").one(),
    )
    .await
    .unwrap();
    assert_eq!(count.row().and_then(|r| r.get("n")), Some(&Value::Int(1)));

    let row = query_db(engine.as_ref(), &Query::new("SELECT id, name FROM dbkit_types").one())
        .await
        .unwrap();
    let row = row.row().unwrap();
    assert_eq!(row.get("id"), Some(&Value::Int(7)));
    assert_eq!(row.get("name"), Some(&Value::String("seven".to_string())));
}
