//! SQLite Database Engine Implementation
//!
//! Embedded file engine backed by sqlx. The target file must already exist; a missing file is
//! reported before any connection attempt.

use crate::database::{
    engine::{DatabaseConnection, DatabaseEngine, ErrorPolicy},
    types::{DatabaseError, DatabaseType, Row, SqliteConnectionInfo, Value},
};
use async_trait::async_trait;
use regex::Regex;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row as _, Sqlite, TypeInfo, ValueRef};
use std::sync::LazyLock;
use tracing::debug;

/// Statements before which a transaction is opened implicitly
static IMPLICIT_BEGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(INSERT|UPDATE|DELETE|REPLACE)\b").expect("implicit begin pattern")
});

/// SQLite Database Engine
#[derive(Debug, Clone)]
pub struct SqliteEngine {
    info: SqliteConnectionInfo,
}

impl SqliteEngine {
    pub fn new(info: SqliteConnectionInfo) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &SqliteConnectionInfo {
        &self.info
    }
}

#[async_trait]
impl DatabaseEngine for SqliteEngine {
    fn engine_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn database_name(&self) -> String {
        self.info.path.display().to_string()
    }

    async fn connect(&self) -> Result<Box<dyn DatabaseConnection>, DatabaseError> {
        let connection = SqliteConnection::open(&self.info).await?;
        Ok(Box::new(connection))
    }

    fn bounded_delete_sql(&self, table: &str, batch_size: u64) -> String {
        // DELETE ... LIMIT needs SQLITE_ENABLE_UPDATE_DELETE_LIMIT; the rowid form works on any build.
        format!(
            "DELETE FROM {table} WHERE rowid IN (SELECT rowid FROM {table} LIMIT {batch_size})"
        )
    }

    fn validate_config(&self) -> Result<(), DatabaseError> {
        if self.info.path.as_os_str().is_empty() {
            return Err(DatabaseError::ConfigurationError(
                "Database path is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// SQLite Connection
///
/// A single sqlx connection. Write statements open a transaction lazily; nothing is written
/// until `commit`, and closing without a commit discards pending work.
pub struct SqliteConnection {
    conn: sqlx::SqliteConnection,
    in_transaction: bool,
}

impl SqliteConnection {
    pub async fn open(info: &SqliteConnectionInfo) -> Result<Self, DatabaseError> {
        if !info.path.exists() {
            return Err(DatabaseError::NotFound(format!(
                "The database file {} does not exist.",
                info.path.display()
            )));
        }

        let conn = SqliteConnectOptions::new()
            .filename(&info.path)
            .create_if_missing(false)
            .connect()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            conn,
            in_transaction: false,
        })
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn begin_if_needed(&mut self, sql: &str) -> Result<(), DatabaseError> {
        if self.in_transaction || !IMPLICIT_BEGIN.is_match(sql) {
            return Ok(());
        }
        sqlx::query("BEGIN")
            .execute(&mut self.conn)
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        self.in_transaction = true;
        debug!("transaction opened");
        Ok(())
    }

    fn bind_params<'q>(
        sql: &'q str,
        params: &[Value],
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<i64>),
                Value::Bool(b) => query.bind(*b as i64),
                Value::Int(i) => query.bind(*i),
                Value::Float(f) => query.bind(*f),
                Value::String(s) => query.bind(s.clone()),
                Value::Binary(b) => query.bind(b.clone()),
                Value::DateTime(dt) => query.bind(dt.to_rfc3339()),
                Value::Json(j) => query.bind(j.to_string()),
            };
        }
        query
    }

    fn convert_row(row: &SqliteRow) -> Result<Row, DatabaseError> {
        let columns: Vec<String> = row
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let values = (0..columns.len())
            .map(|idx| Self::extract_value(row, idx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Row::new(columns, values))
    }

    /// Extract value from SQLite row
    fn extract_value(row: &SqliteRow, idx: usize) -> Result<Value, DatabaseError> {
        let value_ref = row.try_get_raw(idx).map_err(|e| {
            DatabaseError::QueryFailed(format!("Failed to get value at index {}: {}", idx, e))
        })?;

        if value_ref.is_null() {
            return Ok(Value::Null);
        }

        // SQLite uses dynamic typing, so we check the stored value's type
        let type_name = value_ref.type_info().name().to_string();

        match type_name.as_str() {
            "INTEGER" => {
                let val: i64 = row.try_get(idx).map_err(|e| {
                    DatabaseError::QueryFailed(format!("Failed to get INTEGER: {}", e))
                })?;
                Ok(Value::Int(val))
            }
            "REAL" => {
                let val: f64 = row.try_get(idx).map_err(|e| {
                    DatabaseError::QueryFailed(format!("Failed to get REAL: {}", e))
                })?;
                Ok(Value::Float(val))
            }
            "TEXT" => {
                let val: String = row.try_get(idx).map_err(|e| {
                    DatabaseError::QueryFailed(format!("Failed to get TEXT: {}", e))
                })?;
                Ok(Value::String(val))
            }
            "BLOB" => {
                let val: Vec<u8> = row.try_get(idx).map_err(|e| {
                    DatabaseError::QueryFailed(format!("Failed to get BLOB: {}", e))
                })?;
                Ok(Value::Binary(val))
            }
            _ => {
                if let Ok(val) = row.try_get::<String, _>(idx) {
                    Ok(Value::String(val))
                } else if let Ok(val) = row.try_get::<i64, _>(idx) {
                    Ok(Value::Int(val))
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DatabaseError> {
        let rows = Self::bind_params(sql, params)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::convert_row).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DatabaseError> {
        self.begin_if_needed(sql).await?;

        let result = Self::bind_params(sql, params)
            .execute(&mut self.conn)
            .await
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Connection-wide change counter; the connection is fresh per call, so this covers every
    /// statement the call ran.
    async fn rows_affected(&mut self, _reported: u64) -> Result<u64, DatabaseError> {
        let total: i64 = sqlx::query_scalar("SELECT total_changes()")
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Ok(total.max(0) as u64)
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Ok(());
        }
        sqlx::query("COMMIT")
            .execute(&mut self.conn)
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Ok(());
        }
        sqlx::query("ROLLBACK")
            .execute(&mut self.conn)
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        self.in_transaction = false;
        Ok(())
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::SkipCommit
    }

    async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
        self.conn
            .close()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(format!("Failed to close: {}", e)))
    }
}
