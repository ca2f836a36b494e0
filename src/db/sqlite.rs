//! SQLite database client implementation.
//!
//! Lets a catalog be dry-run against a local database file (or `sqlite::memory:`)
//! without a SQL Server instance. Uses sqlx with a single-connection pool.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{DiagnosticsError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::warn;

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Opens the database named by the `sqlite:` connection string.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let options = SqliteConnectOptions::from_str(&conn_str)
            .map_err(|e| DiagnosticsError::config(format!("Invalid connection string: {e}")))?;

        // One connection that never expires, so an in-memory database lives
        // as long as the client does.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| DiagnosticsError::connection(format!("Failed to open {conn_str}: {e}")))?;

        Ok(Self { pool })
    }

    /// Creates a client from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DiagnosticsError::connection(format!("Liveness check failed: {e}")))?;
        Ok(())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        // Column metadata comes from the prepared statement, so an empty
        // result still reports its columns.
        let described = (&self.pool)
            .describe(sql)
            .await
            .map_err(|e| DiagnosticsError::query(e.to_string()))?;
        let columns: Vec<ColumnInfo> = described
            .columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect();

        let result = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DiagnosticsError::query(e.to_string()))?;

        let mut rows = Vec::with_capacity(result.len());
        let mut skipped_rows = 0;
        for (i, row) in result.iter().enumerate() {
            match convert_row(row) {
                Ok(converted) => rows.push(converted),
                Err(e) => {
                    warn!("Skipping row {}: {e}", i + 1);
                    skipped_rows += 1;
                }
            }
        }

        Ok(QueryResult {
            columns,
            rows,
            execution_time: start.elapsed(),
            skipped_rows,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Result<Row> {
    (0..row.len()).map(|i| convert_value(row, i)).collect()
}

/// Converts a single value by its runtime storage class.
fn convert_value(row: &SqliteRow, index: usize) -> Result<Value> {
    let decode_err = |e: sqlx::Error| DiagnosticsError::row_decode(format!("column {index}: {e}"));

    let raw = row.try_get_raw(index).map_err(decode_err)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage_class = raw.type_info().name().to_uppercase();

    let value = match storage_class.as_str() {
        "INTEGER" => Value::Int(row.try_get_unchecked::<i64, _>(index).map_err(decode_err)?),
        "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(index).map_err(decode_err)?),
        "BLOB" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index).map_err(decode_err)?),
        _ => Value::String(row.try_get_unchecked::<String, _>(index).map_err(decode_err)?),
    };
    Ok(value)
}
