//! Scoped connection lifecycle
//!
//! 接続 → 本体 → コミット/ロールバック → クローズ を一つのスコープで保証する

use super::engine::{DatabaseConnection, DatabaseEngine, ErrorPolicy};
use super::types::{DatabaseError, DatabaseType};
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

/// One live connection owned for the duration of a single call.
///
/// Acquire with [`ScopedConnection::open`], run work through [`ScopedConnection::connection`],
/// then hand the body's outcome to [`ScopedConnection::finish`], which commits on success,
/// applies the connection's [`ErrorPolicy`] on failure and always closes. A scope dropped
/// without `finish` closes the driver connection without committing.
pub struct ScopedConnection {
    conn: Box<dyn DatabaseConnection>,
    engine_type: DatabaseType,
    scope_id: Uuid,
}

impl ScopedConnection {
    /// Open a fresh connection for this scope
    pub async fn open(engine: &dyn DatabaseEngine) -> Result<Self, DatabaseError> {
        let scope_id = Uuid::new_v4();
        let engine_type = engine.engine_type();
        let span = tracing::debug_span!("db_scope", %scope_id, engine = %engine_type);

        let conn = engine.connect().instrument(span).await?;
        debug!(%scope_id, engine = %engine_type, "connection opened");

        Ok(Self {
            conn,
            engine_type,
            scope_id,
        })
    }

    pub fn connection(&mut self) -> &mut dyn DatabaseConnection {
        self.conn.as_mut()
    }

    pub fn engine_type(&self) -> DatabaseType {
        self.engine_type
    }

    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    /// Settle the transaction according to `outcome` and close the connection.
    ///
    /// A failed body's error is returned unchanged; failures while rolling back or closing
    /// after it are only logged. On success, commit and close failures are returned.
    pub async fn finish<T>(self, outcome: Result<T, DatabaseError>) -> Result<T, DatabaseError> {
        let Self {
            mut conn,
            engine_type,
            scope_id,
        } = self;

        let span = tracing::debug_span!("db_scope", %scope_id, engine = %engine_type);

        async move {
            match outcome {
                Ok(value) => {
                    if let Err(e) = conn.commit().await {
                        if let Err(close_err) = conn.close().await {
                            warn!(error = %close_err, "close after failed commit also failed");
                        }
                        return Err(e);
                    }
                    debug!("committed");
                    conn.close().await?;
                    debug!("connection closed");
                    Ok(value)
                }
                Err(body_err) => {
                    match conn.error_policy() {
                        ErrorPolicy::Rollback => match conn.rollback().await {
                            Ok(()) => debug!("rolled back"),
                            Err(e) => warn!(error = %e, "rollback failed"),
                        },
                        ErrorPolicy::SkipCommit => {
                            debug!("commit skipped; pending work discarded on close")
                        }
                    }
                    if let Err(e) = conn.close().await {
                        warn!(error = %e, "close failed");
                    } else {
                        debug!("connection closed");
                    }
                    Err(body_err)
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::types::{Row, Value};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records every lifecycle call made against it
    struct RecordingConnection {
        log: Arc<Mutex<Vec<&'static str>>>,
        policy: ErrorPolicy,
        fail_commit: bool,
    }

    #[async_trait]
    impl DatabaseConnection for RecordingConnection {
        async fn query(&mut self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>, DatabaseError> {
            self.log.lock().unwrap().push("query");
            Ok(vec![])
        }

        async fn execute(&mut self, _sql: &str, _params: &[Value]) -> Result<u64, DatabaseError> {
            self.log.lock().unwrap().push("execute");
            Ok(1)
        }

        async fn commit(&mut self) -> Result<(), DatabaseError> {
            self.log.lock().unwrap().push("commit");
            if self.fail_commit {
                return Err(DatabaseError::TransactionFailed("commit refused".into()));
            }
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), DatabaseError> {
            self.log.lock().unwrap().push("rollback");
            Ok(())
        }

        fn error_policy(&self) -> ErrorPolicy {
            self.policy
        }

        async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
            self.log.lock().unwrap().push("close");
            Ok(())
        }
    }

    struct RecordingEngine {
        log: Arc<Mutex<Vec<&'static str>>>,
        policy: ErrorPolicy,
        fail_commit: bool,
        fail_connect: bool,
    }

    impl RecordingEngine {
        fn new(policy: ErrorPolicy) -> Self {
            Self {
                log: Arc::new(Mutex::new(Vec::new())),
                policy,
                fail_commit: false,
                fail_connect: false,
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatabaseEngine for RecordingEngine {
        fn engine_type(&self) -> DatabaseType {
            DatabaseType::SQLite
        }

        fn database_name(&self) -> String {
            "recording".to_string()
        }

        async fn connect(&self) -> Result<Box<dyn DatabaseConnection>, DatabaseError> {
            if self.fail_connect {
                return Err(DatabaseError::ConnectionFailed("refused".into()));
            }
            self.log.lock().unwrap().push("open");
            Ok(Box::new(RecordingConnection {
                log: self.log.clone(),
                policy: self.policy,
                fail_commit: self.fail_commit,
            }))
        }

        fn bounded_delete_sql(&self, table: &str, batch_size: u64) -> String {
            format!("DELETE FROM {} LIMIT {}", table, batch_size)
        }

        fn validate_config(&self) -> Result<(), DatabaseError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_success_commits_then_closes() {
        let engine = RecordingEngine::new(ErrorPolicy::Rollback);
        let mut scope = ScopedConnection::open(&engine).await.unwrap();
        let outcome = scope.connection().execute("UPDATE t SET a = 1", &[]).await;
        let value = scope.finish(outcome).await.unwrap();

        assert_eq!(value, 1);
        assert_eq!(engine.calls(), vec!["open", "execute", "commit", "close"]);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_then_closes() {
        let engine = RecordingEngine::new(ErrorPolicy::Rollback);
        let scope = ScopedConnection::open(&engine).await.unwrap();
        let outcome: Result<(), _> = Err(DatabaseError::QueryFailed("boom".into()));
        let err = scope.finish(outcome).await.unwrap_err();

        assert!(matches!(err, DatabaseError::QueryFailed(ref m) if m == "boom"));
        assert_eq!(engine.calls(), vec!["open", "rollback", "close"]);
    }

    #[tokio::test]
    async fn test_failure_with_skip_commit_only_closes() {
        let engine = RecordingEngine::new(ErrorPolicy::SkipCommit);
        let scope = ScopedConnection::open(&engine).await.unwrap();
        let outcome: Result<(), _> = Err(DatabaseError::QueryFailed("boom".into()));
        assert!(scope.finish(outcome).await.is_err());

        assert_eq!(engine.calls(), vec!["open", "close"]);
    }

    #[tokio::test]
    async fn test_commit_failure_is_returned_and_connection_closed() {
        let mut engine = RecordingEngine::new(ErrorPolicy::Rollback);
        engine.fail_commit = true;
        let scope = ScopedConnection::open(&engine).await.unwrap();
        let err = scope.finish(Ok(())).await.unwrap_err();

        assert!(matches!(err, DatabaseError::TransactionFailed(_)));
        assert_eq!(engine.calls(), vec!["open", "commit", "close"]);
    }

    #[tokio::test]
    async fn test_open_failure_surfaces() {
        let mut engine = RecordingEngine::new(ErrorPolicy::Rollback);
        engine.fail_connect = true;
        let err = ScopedConnection::open(&engine).await.err().unwrap();

        assert!(err.is_connection_error());
        assert!(engine.calls().is_empty());
    }
}
