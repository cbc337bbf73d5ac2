//! Database Module
//!
//! SQL Server / MySQL / SQLite に対する統一的な接続・クエリ・一括削除インターフェースを提供

pub mod engine;
pub mod engines;
pub mod ops;
pub mod scope;
pub mod statement;
pub mod types;

// 公開API
pub use engine::{DatabaseConnection, DatabaseEngine, DatabaseEngineBuilder, ErrorPolicy};
pub use ops::{batch_delete_tables, connection_test, query_db, DEFAULT_BATCH_SIZE};
pub use scope::ScopedConnection;
pub use statement::{Params, Query, StatementKind};
pub use types::{
    BatchDeleteReport, DatabaseConfig, DatabaseError, DatabaseType, NetworkConnectionInfo,
    QueryResult, Row, SqliteConnectionInfo, Value,
};
