//! # dbkit
//!
//! Scoped connect / query / bulk-delete helpers for SQL Server, MySQL and SQLite.
//!
//! Every operation opens its own connection, runs one statement inside a transaction, and
//! settles that transaction (commit, rollback, or skip) before the connection is closed.
//!
//! ```no_run
//! use dbkit::database::{query_db, DatabaseConfig, DatabaseEngineBuilder, Query, SqliteConnectionInfo};
//!
//! # async fn run() -> dbkit::Result<()> {
//! let engine = DatabaseEngineBuilder::build(&DatabaseConfig::Sqlite(
//!     SqliteConnectionInfo::new("app.db"),
//! ))?;
//! let users = query_db(engine.as_ref(), &Query::new("SELECT id, name FROM users")).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod logging;

pub use crate::config::{ConfigLoader, DbKitConfig};
pub use database::{
    batch_delete_tables, connection_test, query_db, DatabaseEngine, Query, QueryResult,
    DEFAULT_BATCH_SIZE,
};
pub use error::{Error, Result};
pub use logging::{init_logging, LogConfig};
