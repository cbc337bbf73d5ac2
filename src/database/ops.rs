//! Query, bulk delete and connectivity operations
//!
//! Every call opens its own [`ScopedConnection`], runs one statement (or one batch of the same
//! statement) and settles the transaction before returning.

use super::engine::{DatabaseConnection, DatabaseEngine};
use super::scope::ScopedConnection;
use super::statement::{Query, StatementKind};
use super::types::{BatchDeleteReport, DatabaseError, QueryResult};
use tracing::{error, info, warn};

/// Rows removed per statement when the caller does not choose
pub const DEFAULT_BATCH_SIZE: u64 = 1000;

/// Run one statement inside a fresh scoped connection.
///
/// Read statements (leading `SELECT`) return [`QueryResult::Rows`], or [`QueryResult::Row`]
/// when the query asked for one row. Everything else returns [`QueryResult::Affected`] using
/// the backend's own affected-row accounting. Execution errors are logged with the database,
/// statement, and parameters, then returned after the scope has settled.
pub async fn query_db(
    engine: &dyn DatabaseEngine,
    query: &Query,
) -> Result<QueryResult, DatabaseError> {
    query.validate()?;

    let mut scope = match ScopedConnection::open(engine).await {
        Ok(scope) => scope,
        Err(e) => {
            log_query_error(engine, query, &e);
            return Err(e);
        }
    };
    let outcome = run_statement(scope.connection(), query).await;

    if let Err(e) = &outcome {
        log_query_error(engine, query, e);
    }

    scope.finish(outcome).await
}

fn log_query_error(engine: &dyn DatabaseEngine, query: &Query, e: &DatabaseError) {
    error!(
        database = %engine.database_name(),
        query = %query.sql(),
        params = ?query.params(),
        error = %e,
        "Query Error"
    );
}

async fn run_statement(
    conn: &mut dyn DatabaseConnection,
    query: &Query,
) -> Result<QueryResult, DatabaseError> {
    match query.kind() {
        StatementKind::Read => {
            let mut rows = Vec::new();
            for params in query.param_sets() {
                rows.extend(conn.query(query.sql(), params).await?);
            }
            if query.wants_one() {
                Ok(QueryResult::Row(rows.into_iter().next()))
            } else {
                Ok(QueryResult::Rows(rows))
            }
        }
        StatementKind::Write => {
            let mut reported = 0u64;
            for params in query.param_sets() {
                reported += conn.execute(query.sql(), params).await?;
            }
            let affected = conn.rows_affected(reported).await?;
            Ok(QueryResult::Affected(affected))
        }
    }
}

/// Delete every row of `table` in chunks of `batch_size`.
///
/// Each chunk runs through [`query_db`], so each one is committed on its own; a failure
/// part-way leaves earlier chunks deleted. `table` is placed into the statement text as-is and
/// must never come from untrusted input.
pub async fn batch_delete_tables(
    engine: &dyn DatabaseEngine,
    table: &str,
    batch_size: u64,
) -> Result<BatchDeleteReport, DatabaseError> {
    if batch_size == 0 {
        return Err(DatabaseError::ValidationError(
            "batch_size must be greater than zero".to_string(),
        ));
    }

    let delete = Query::new(engine.bounded_delete_sql(table, batch_size));
    let mut report = BatchDeleteReport {
        table: table.to_string(),
        batch_size,
        batches: Vec::new(),
        total_deleted: 0,
        statements_issued: 0,
    };

    loop {
        let deleted = match query_db(engine, &delete).await? {
            QueryResult::Affected(n) => n,
            other => {
                return Err(DatabaseError::QueryFailed(format!(
                    "bounded delete returned rows instead of a count: {:?}",
                    other
                )))
            }
        };
        report.statements_issued += 1;

        if deleted == 0 {
            break;
        }

        report.total_deleted += deleted;
        report.batches.push(deleted);

        info!(
            table = %table,
            deleted,
            total = report.total_deleted,
            "{} rows deleted from {}. Total deleted: {}",
            deleted,
            table,
            report.total_deleted
        );
    }

    Ok(report)
}

/// Open and immediately release a scoped connection.
///
/// Never fails: connection problems are logged and reported as `false`.
pub async fn connection_test(engine: &dyn DatabaseEngine) -> bool {
    let name = engine.engine_type().display_name();

    let result = match ScopedConnection::open(engine).await {
        Ok(scope) => scope.finish(Ok(())).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            info!(database = %engine.database_name(), "Successfully connected to {} database.", name);
            true
        }
        Err(e) => {
            warn!(database = %engine.database_name(), error = %e, "Connection failed: {}", e);
            false
        }
    }
}
