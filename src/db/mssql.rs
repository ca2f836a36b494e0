//! SQL Server database client implementation.
//!
//! Provides the `SqlServerClient` struct that implements the `DatabaseClient`
//! trait for SQL Server using tiberius over a tokio TCP stream.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{DiagnosticsError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use std::time::{Duration, Instant};
use tiberius::{Client, ColumnData, Config, QueryItem};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

/// Connection timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 30;

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server database client.
///
/// Holds a single connection; queries run one at a time.
pub struct SqlServerClient {
    client: Mutex<Option<TdsClient>>,
}

impl SqlServerClient {
    /// Connects using the ADO connection string built from `config`.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let tds_config = tds_config(&config.to_connection_string()?)?;

        debug!("Connecting to {}", config.display_string());
        let timeout = Duration::from_secs(CONNECT_TIMEOUT_SECS);
        let client = tokio::time::timeout(timeout, open(tds_config))
            .await
            .map_err(|_| {
                DiagnosticsError::connection(format!(
                    "Timed out after {CONNECT_TIMEOUT_SECS} seconds connecting to {}",
                    config.display_string()
                ))
            })??;

        Ok(Self {
            client: Mutex::new(Some(client)),
        })
    }
}

/// Parses an ADO connection string into a tiberius config.
///
/// Outside Windows tiberius is built without integrated authentication and
/// would quietly fall back to a SQL login with an empty user, so asking for
/// it is a configuration error.
fn tds_config(conn_str: &str) -> Result<Config> {
    if requests_integrated_auth(conn_str) && !cfg!(windows) {
        return Err(DiagnosticsError::config(
            "Integrated security (TRUSTED=true) is only supported on Windows; \
             set TRUSTED=false and provide USER and PASSWORD",
        ));
    }
    Config::from_ado_string(conn_str)
        .map_err(|e| DiagnosticsError::config(format!("Invalid connection string: {e}")))
}

/// Returns true if the ADO string turns on `IntegratedSecurity`.
fn requests_integrated_auth(conn_str: &str) -> bool {
    conn_str
        .split(';')
        .filter_map(|segment| segment.split_once('='))
        .any(|(key, value)| {
            let key = key.trim().to_lowercase();
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase();
            matches!(key.as_str(), "integratedsecurity" | "integrated security")
                && matches!(value.as_str(), "true" | "yes" | "sspi")
        })
}

/// Opens the TCP stream and performs the TDS login, following one routing redirect.
async fn open(config: Config) -> Result<TdsClient> {
    let tcp = tcp_connect(&config).await?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            debug!("Server redirected the connection to {host}:{port}");
            let mut routed = config;
            routed.host(&host);
            routed.port(port);
            let tcp = tcp_connect(&routed).await?;
            Client::connect(routed, tcp.compat_write())
                .await
                .map_err(|e| DiagnosticsError::connection(e.to_string()))
        }
        Err(e) => Err(DiagnosticsError::connection(e.to_string())),
    }
}

async fn tcp_connect(config: &Config) -> Result<TcpStream> {
    let addr = config.get_addr();
    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|e| DiagnosticsError::connection(format!("Cannot reach {addr}: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| DiagnosticsError::connection(e.to_string()))?;
    Ok(tcp)
}

#[async_trait]
impl DatabaseClient for SqlServerClient {
    async fn ping(&self) -> Result<()> {
        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| DiagnosticsError::connection("Connection is closed"))?;

        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| DiagnosticsError::connection(format!("Liveness check failed: {e}")))?
            .into_row()
            .await
            .map_err(|e| DiagnosticsError::connection(format!("Liveness check failed: {e}")))?;

        Ok(())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| DiagnosticsError::query("Connection is closed"))?;

        let start = Instant::now();
        let mut stream = client
            .simple_query(sql)
            .await
            .map_err(|e| DiagnosticsError::query(e.to_string()))?;

        let columns: Vec<ColumnInfo> = stream
            .columns()
            .await
            .map_err(|e| DiagnosticsError::query(e.to_string()))?
            .map(|cols| {
                cols.iter()
                    .map(|col| ColumnInfo::new(col.name(), format!("{:?}", col.column_type())))
                    .collect()
            })
            .unwrap_or_default();

        // Only the first result set is reported, but the whole token stream
        // is drained so the connection is ready for the next statement.
        let mut rows = Vec::new();
        let mut skipped_rows = 0;
        while let Some(item) = stream
            .try_next()
            .await
            .map_err(|e| DiagnosticsError::query(e.to_string()))?
        {
            let QueryItem::Row(row) = item else {
                continue;
            };
            if row.result_index() != 0 {
                continue;
            }
            match convert_row(&row) {
                Ok(converted) => rows.push(converted),
                Err(e) => {
                    warn!("Skipping row {}: {e}", rows.len() + skipped_rows + 1);
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
        if let Some(client) = self.client.lock().await.take() {
            client
                .close()
                .await
                .map_err(|e| DiagnosticsError::connection(e.to_string()))?;
        }
        Ok(())
    }
}

/// Converts a tiberius row to our Row type.
fn convert_row(row: &tiberius::Row) -> Result<Row> {
    row.cells()
        .enumerate()
        .map(|(index, (column, data))| convert_value(row, index, column.name(), data))
        .collect()
}

/// Converts a single cell. Decimals, GUIDs, XML and temporal values become text.
fn convert_value(
    row: &tiberius::Row,
    index: usize,
    column: &str,
    data: &ColumnData<'static>,
) -> Result<Value> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I16(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I32(v) => v.map(|v| Value::Int(v.into())),
        ColumnData::I64(v) => v.map(Value::Int),
        ColumnData::F32(v) => v.map(|v| Value::Float(v.into())),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| Value::String(s.to_string())),
        ColumnData::Guid(v) => v.as_ref().map(|g| Value::String(g.to_string())),
        ColumnData::Binary(v) => v.as_ref().map(|b| Value::Bytes(b.to_vec())),
        ColumnData::Numeric(v) => v.as_ref().map(|n| Value::String(n.to_string())),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|xml| Value::String(xml.clone().into_owned().into_string())),
        _ => decode_temporal(row, index).ok_or_else(|| {
            DiagnosticsError::row_decode(format!("unsupported value in column '{column}'"))
        })?,
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Decodes date/time columns through their chrono representations.
fn decode_temporal(row: &tiberius::Row, index: usize) -> Option<Option<Value>> {
    fn text<T: ToString>(v: Option<T>) -> Option<Value> {
        v.map(|v| Value::String(v.to_string()))
    }

    if let Ok(v) = row.try_get::<NaiveDateTime, _>(index) {
        return Some(text(v));
    }
    if let Ok(v) = row.try_get::<NaiveDate, _>(index) {
        return Some(text(v));
    }
    if let Ok(v) = row.try_get::<NaiveTime, _>(index) {
        return Some(text(v));
    }
    if let Ok(v) = row.try_get::<DateTime<FixedOffset>, _>(index) {
        return Some(text(v));
    }
    None
}
