//! Database abstraction layer.
//!
//! Provides a trait-based interface for database operations, allowing
//! different database backends to be used interchangeably.

mod mock;
mod mssql;
mod sqlite;
mod types;

pub use mock::{FailingDatabaseClient, MockDatabaseClient};
pub use mssql::SqlServerClient;
pub use sqlite::SqliteClient;
pub use types::{flatten_line_breaks, render_row, ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseBackend {
    #[default]
    SqlServer,
    /// Local SQLite database, for dry-runs of a catalog.
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlServer => "sqlserver",
            Self::Sqlite => "sqlite",
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::SqlServer => 1433,
            Self::Sqlite => 0,
        }
    }
}

/// Opens a connection for the given configuration and checks that it is alive.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    let client: Box<dyn DatabaseClient> = match config.backend() {
        DatabaseBackend::SqlServer => Box::new(SqlServerClient::connect(config).await?),
        DatabaseBackend::Sqlite => Box::new(SqliteClient::connect(config).await?),
    };

    if let Err(e) = client.ping().await {
        let _ = client.close().await;
        return Err(e);
    }
    debug!(backend = config.backend().as_str(), "Connection is alive");

    Ok(client)
}

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with DiagnosticsError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Runs a trivial statement; fails with a connection error if the server is unreachable.
    async fn ping(&self) -> Result<()>;

    /// Executes a SQL statement and returns its first result set.
    ///
    /// A statement that produces no result set returns an empty result
    /// (no columns, no rows). Rows that fail to decode are logged and skipped.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
