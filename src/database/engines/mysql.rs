//! MySQL Engine Implementation
//!
//! Provides MySQL connections using mysql_async. Each connection runs with autocommit
//! disabled so that the owning scope decides between COMMIT and ROLLBACK.

use crate::database::{
    engine::{DatabaseConnection, DatabaseEngine},
    types::{DatabaseError, DatabaseType, NetworkConnectionInfo, Row, Value},
};
use async_trait::async_trait;
use mysql_async::{prelude::*, Conn, OptsBuilder};
use secrecy::ExposeSecret;

/// MySQL Database Engine
#[derive(Debug, Clone)]
pub struct MySqlEngine {
    info: NetworkConnectionInfo,
}

impl MySqlEngine {
    pub fn new(info: NetworkConnectionInfo) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &NetworkConnectionInfo {
        &self.info
    }

    fn port(&self) -> u16 {
        self.info
            .port
            .or(DatabaseType::MySql.default_port())
            .unwrap_or(3306)
    }

    fn opts(&self) -> OptsBuilder {
        OptsBuilder::default()
            .ip_or_hostname(self.info.host.clone())
            .tcp_port(self.port())
            .user(Some(self.info.user.clone()))
            .pass(Some(self.info.password.expose_secret().to_string()))
            .db_name(Some(self.info.database.clone()))
            .init(vec!["SET autocommit=0"])
    }
}

#[async_trait]
impl DatabaseEngine for MySqlEngine {
    fn engine_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn database_name(&self) -> String {
        self.info.database.clone()
    }

    async fn connect(&self) -> Result<Box<dyn DatabaseConnection>, DatabaseError> {
        let conn = Conn::new(self.opts()).await.map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to connect to MySQL: {}", e))
        })?;

        Ok(Box::new(MySqlConnection { conn }))
    }

    fn bounded_delete_sql(&self, table: &str, batch_size: u64) -> String {
        format!("DELETE FROM {} LIMIT {}", table, batch_size)
    }

    fn validate_config(&self) -> Result<(), DatabaseError> {
        if self.info.host.is_empty() {
            return Err(DatabaseError::ConfigurationError(
                "MySQL host is required".to_string(),
            ));
        }
        if self.info.database.is_empty() {
            return Err(DatabaseError::ConfigurationError(
                "MySQL database name is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// MySQL Database Connection
pub struct MySqlConnection {
    conn: Conn,
}

impl MySqlConnection {
    /// Convert mysql_async Value to our Value type
    fn convert_value(mysql_value: mysql_async::Value) -> Value {
        match mysql_value {
            mysql_async::Value::NULL => Value::Null,
            mysql_async::Value::Bytes(bytes) => {
                // Try to convert to UTF-8 string, fall back to raw bytes
                match String::from_utf8(bytes) {
                    Ok(s) => Value::String(s),
                    Err(e) => Value::Binary(e.into_bytes()),
                }
            }
            mysql_async::Value::Int(i) => Value::Int(i),
            mysql_async::Value::UInt(u) => Value::Int(u as i64),
            mysql_async::Value::Float(f) => Value::Float(f as f64),
            mysql_async::Value::Double(d) => Value::Float(d),
            mysql_async::Value::Date(year, month, day, hour, minute, second, micro) => {
                Value::String(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
                    year, month, day, hour, minute, second, micro
                ))
            }
            mysql_async::Value::Time(neg, days, hours, minutes, seconds, micros) => {
                let sign = if neg { "-" } else { "" };
                let total_hours = days * 24 + hours as u32;
                Value::String(format!(
                    "{}{}:{:02}:{:02}.{:06}",
                    sign, total_hours, minutes, seconds, micros
                ))
            }
        }
    }

    /// Convert our Value type to mysql_async positional params
    fn convert_params(params: &[Value]) -> Vec<mysql_async::Value> {
        params
            .iter()
            .map(|v| match v {
                Value::Null => mysql_async::Value::NULL,
                Value::Bool(b) => mysql_async::Value::Int(*b as i64),
                Value::Int(i) => mysql_async::Value::Int(*i),
                Value::Float(f) => mysql_async::Value::Double(*f),
                Value::String(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
                Value::Binary(b) => mysql_async::Value::Bytes(b.clone()),
                Value::Json(j) => mysql_async::Value::Bytes(j.to_string().into_bytes()),
                Value::DateTime(dt) => mysql_async::Value::Bytes(
                    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string().into_bytes(),
                ),
            })
            .collect()
    }

    fn convert_row(row: mysql_async::Row) -> Row {
        let columns = row
            .columns_ref()
            .iter()
            .map(|col| col.name_str().to_string())
            .collect();
        let values = row.unwrap().into_iter().map(Self::convert_value).collect();
        Row::new(columns, values)
    }
}

#[async_trait]
impl DatabaseConnection for MySqlConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DatabaseError> {
        // Binary protocol even without parameters, so column types survive
        let rows: Vec<mysql_async::Row> = self
            .conn
            .exec(sql, Self::convert_params(params))
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Query execution failed: {}", e)))?;

        Ok(rows.into_iter().map(Self::convert_row).collect())
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DatabaseError> {
        self.conn
            .exec_drop(sql, Self::convert_params(params))
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Execute failed: {}", e)))?;

        Ok(self.conn.affected_rows())
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.conn.query_drop("COMMIT").await.map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to commit transaction: {}", e))
        })
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.conn.query_drop("ROLLBACK").await.map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to rollback transaction: {}", e))
        })
    }

    async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
        self.conn.disconnect().await.map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to close connection: {}", e))
        })
    }
}
