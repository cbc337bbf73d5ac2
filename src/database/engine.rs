//! Database Engine Abstraction Layer
//!
//! 異なるデータベースエンジンに対する統一インターフェース

use super::types::{DatabaseConfig, DatabaseError, DatabaseType, Row, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// What a scope does with pending work when its body failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Issue an explicit ROLLBACK before closing
    Rollback,
    /// Skip the commit and let the driver discard the transaction on close
    SkipCommit,
}

/// データベースエンジン抽象化トレイト
///
/// Holds the connection info for one target database and knows that backend's SQL dialect.
#[async_trait]
pub trait DatabaseEngine: Send + Sync {
    /// データベースタイプを返す
    fn engine_type(&self) -> DatabaseType;

    /// Identifier used in diagnostics (database name or file path)
    fn database_name(&self) -> String;

    /// 新しい接続を作成
    async fn connect(&self) -> Result<Box<dyn DatabaseConnection>, DatabaseError>;

    /// Statement deleting at most `batch_size` rows from `table`.
    ///
    /// `table` is interpolated verbatim and must be a trusted identifier.
    fn bounded_delete_sql(&self, table: &str, batch_size: u64) -> String;

    /// エンジン固有の設定を検証
    fn validate_config(&self) -> Result<(), DatabaseError>;
}

/// データベース接続抽象化トレイト
///
/// One live driver connection, owned exclusively by a single scope.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Run a statement and fetch every row it produces
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DatabaseError>;

    /// Run a statement and return the driver's affected-row count for it
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DatabaseError>;

    /// Affected-row figure reported to the caller after the write statements of a call.
    ///
    /// `reported` is the sum of what `execute` returned.
    async fn rows_affected(&mut self, reported: u64) -> Result<u64, DatabaseError> {
        Ok(reported)
    }

    /// トランザクションをコミット
    async fn commit(&mut self) -> Result<(), DatabaseError>;

    /// トランザクションをロールバック
    async fn rollback(&mut self) -> Result<(), DatabaseError>;

    /// Scope-exit behaviour after a failed body
    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Rollback
    }

    /// 接続を明示的に閉じる
    async fn close(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// データベースエンジンビルダー
///
/// 設定からデータベースエンジンを構築
pub struct DatabaseEngineBuilder;

impl DatabaseEngineBuilder {
    /// 設定からエンジンを構築
    pub fn build(config: &DatabaseConfig) -> Result<Arc<dyn DatabaseEngine>, DatabaseError> {
        let engine: Arc<dyn DatabaseEngine> = match config {
            #[cfg(feature = "mssql")]
            DatabaseConfig::Mssql(info) => {
                Arc::new(super::engines::mssql::MssqlEngine::new(info.clone()))
            }
            #[cfg(not(feature = "mssql"))]
            DatabaseConfig::Mssql(_) => {
                return Err(DatabaseError::UnsupportedOperation(
                    "SQL Server support not compiled. Enable mssql feature.".to_string(),
                ))
            }
            #[cfg(feature = "mysql")]
            DatabaseConfig::Mysql(info) => {
                Arc::new(super::engines::mysql::MySqlEngine::new(info.clone()))
            }
            #[cfg(not(feature = "mysql"))]
            DatabaseConfig::Mysql(_) => {
                return Err(DatabaseError::UnsupportedOperation(
                    "MySQL support not compiled. Enable mysql feature.".to_string(),
                ))
            }
            #[cfg(feature = "sqlite")]
            DatabaseConfig::Sqlite(info) => {
                Arc::new(super::engines::sqlite::SqliteEngine::new(info.clone()))
            }
            #[cfg(not(feature = "sqlite"))]
            DatabaseConfig::Sqlite(_) => {
                return Err(DatabaseError::UnsupportedOperation(
                    "SQLite support not compiled. Enable sqlite feature.".to_string(),
                ))
            }
        };

        engine.validate_config()?;
        Ok(engine)
    }
}
