//! Database Engines Module
//!
//! 各バックエンドのエンジン実装。コンパイル時のfeatureで有効化する

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mssql")]
pub use mssql::MssqlEngine;
#[cfg(feature = "mysql")]
pub use mysql::MySqlEngine;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEngine;
