//! SQL Server Engine Implementation
//!
//! Provides SQL Server connections over TDS using tiberius. Sessions run with
//! `IMPLICIT_TRANSACTIONS ON`, so every data change waits for an explicit COMMIT.
//!
//! Bind placeholders are `@P1`, `@P2`, ... in parameter order.

use crate::database::{
    engine::{DatabaseConnection, DatabaseEngine},
    types::{DatabaseError, DatabaseType, NetworkConnectionInfo, Row, Value},
};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::borrow::Cow;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// SQL Server Database Engine
#[derive(Debug, Clone)]
pub struct MssqlEngine {
    info: NetworkConnectionInfo,
}

impl MssqlEngine {
    pub fn new(info: NetworkConnectionInfo) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &NetworkConnectionInfo {
        &self.info
    }

    fn port(&self) -> u16 {
        self.info
            .port
            .or(DatabaseType::Mssql.default_port())
            .unwrap_or(1433)
    }

    fn tiberius_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.info.host);
        config.port(self.port());
        config.database(&self.info.database);
        config.authentication(AuthMethod::sql_server(
            &self.info.user,
            self.info.password.expose_secret(),
        ));

        if self.info.option_enabled("trust_cert") {
            config.trust_cert();
        }
        if self
            .info
            .options
            .get("encrypt")
            .map(|v| v.eq_ignore_ascii_case("false") || v == "0")
            .unwrap_or(false)
        {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config
    }
}

#[async_trait]
impl DatabaseEngine for MssqlEngine {
    fn engine_type(&self) -> DatabaseType {
        DatabaseType::Mssql
    }

    fn database_name(&self) -> String {
        self.info.database.clone()
    }

    async fn connect(&self) -> Result<Box<dyn DatabaseConnection>, DatabaseError> {
        let config = self.tiberius_config();

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Failed to connect: {}", e)))?;
        tune_socket(&tcp);

        let mut client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| {
                DatabaseError::ConnectionFailed(format!("Failed to authenticate: {}", e))
            })?;

        client
            .simple_query("SET IMPLICIT_TRANSACTIONS ON")
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?
            .into_results()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        debug!(host = %self.info.host, port = self.port(), "SQL Server session ready");
        Ok(Box::new(MssqlConnection { client }))
    }

    fn bounded_delete_sql(&self, table: &str, batch_size: u64) -> String {
        format!("DELETE TOP({}) FROM {}", batch_size, table)
    }

    fn validate_config(&self) -> Result<(), DatabaseError> {
        if self.info.host.is_empty() {
            return Err(DatabaseError::ConfigurationError(
                "SQL Server host is required".to_string(),
            ));
        }
        if self.info.database.is_empty() {
            return Err(DatabaseError::ConfigurationError(
                "SQL Server database name is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Disable Nagle on the TDS stream; failure is logged and ignored
fn tune_socket(tcp: &TcpStream) {
    if let Err(e) = tcp.set_nodelay(true) {
        debug!(error = %e, "TCP_NODELAY not set");
    }
}

/// Owned parameter wrapper for native TDS parameter binding.
///
/// Values are sent as typed RPC parameters, never interpolated into the statement text.
struct SqlParam(Value);

impl ToSql for SqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match &self.0 {
            Value::Null => ColumnData::String(None),
            Value::Bool(b) => ColumnData::Bit(Some(*b)),
            Value::Int(i) => ColumnData::I64(Some(*i)),
            Value::Float(f) => ColumnData::F64(Some(*f)),
            Value::String(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
            Value::Binary(b) => ColumnData::Binary(Some(Cow::Borrowed(b.as_slice()))),
            Value::Json(j) => ColumnData::String(Some(Cow::Owned(j.to_string()))),
            // SQL Server parses ISO 8601 text into datetime2 implicitly
            Value::DateTime(dt) => ColumnData::String(Some(Cow::Owned(
                dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            ))),
        }
    }
}

/// SQL Server Database Connection
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
}

impl MssqlConnection {
    fn to_params(params: &[Value]) -> Vec<SqlParam> {
        params.iter().cloned().map(SqlParam).collect()
    }

    fn param_refs(params: &[SqlParam]) -> Vec<&dyn ToSql> {
        params.iter().map(|p| p as &dyn ToSql).collect()
    }

    /// Convert one column, probing typed getters before raw bytes
    fn convert_value(row: &tiberius::Row, idx: usize) -> Value {
        if let Ok(Some(v)) = row.try_get::<bool, _>(idx) {
            return Value::Bool(v);
        }
        if let Ok(Some(v)) = row.try_get::<u8, _>(idx) {
            return Value::Int(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<i16, _>(idx) {
            return Value::Int(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
            return Value::Int(v as i64);
        }
        if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
            return Value::Int(v);
        }
        if let Ok(Some(v)) = row.try_get::<f32, _>(idx) {
            return Value::Float(v as f64);
        }
        if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
            return Value::Float(v);
        }
        if let Ok(Some(v)) = row.try_get::<tiberius::numeric::Numeric, _>(idx) {
            return Value::String(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<&str, _>(idx) {
            return Value::String(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<tiberius::Uuid, _>(idx) {
            return Value::String(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
            return Value::DateTime(v.and_utc());
        }
        if let Ok(Some(v)) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx) {
            return Value::DateTime(v);
        }
        if let Ok(Some(v)) = row.try_get::<chrono::NaiveDate, _>(idx) {
            return Value::String(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<chrono::NaiveTime, _>(idx) {
            return Value::String(v.to_string());
        }
        if let Ok(Some(bytes)) = row.try_get::<&[u8], _>(idx) {
            return Value::Binary(bytes.to_vec());
        }

        Value::Null
    }

    fn convert_row(row: &tiberius::Row) -> Row {
        let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
        let values = (0..row.len())
            .map(|idx| Self::convert_value(row, idx))
            .collect();
        Row::new(columns, values)
    }

    async fn run_batch(&mut self, sql: &str) -> Result<(), DatabaseError> {
        self.client
            .simple_query(sql)
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?
            .into_results()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseConnection for MssqlConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DatabaseError> {
        let owned = Self::to_params(params);
        let refs = Self::param_refs(&owned);

        let rows = self
            .client
            .query(sql, &refs)
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?
            .into_first_result()
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to fetch rows: {}", e)))?;

        Ok(rows.iter().map(Self::convert_row).collect())
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DatabaseError> {
        let owned = Self::to_params(params);
        let refs = Self::param_refs(&owned);

        let result = self
            .client
            .execute(sql, &refs)
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Execute failed: {}", e)))?;

        Ok(result.total())
    }

    /// Writes are committed here, before the count is handed back
    async fn rows_affected(&mut self, reported: u64) -> Result<u64, DatabaseError> {
        self.commit().await?;
        Ok(reported)
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.run_batch("IF @@TRANCOUNT > 0 COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.run_batch("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }

    async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
        self.client.close().await.map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to close connection: {}", e))
        })
    }
}
