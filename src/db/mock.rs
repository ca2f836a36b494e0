//! Mock database clients for testing.
//!
//! Provides in-memory database implementations so the report pipeline can be
//! exercised without a server.

use super::{ColumnInfo, DatabaseClient, QueryResult, Value};
use crate::error::{DiagnosticsError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted response for one statement.
#[derive(Debug, Clone)]
enum Scripted {
    Result(QueryResult),
    Error(String),
}

/// A mock database client that returns predefined results.
///
/// Unscripted `SELECT` statements echo back a single row; anything else
/// returns an empty result. Executed statements are recorded.
#[derive(Debug, Default, Clone)]
pub struct MockDatabaseClient {
    scripted: HashMap<String, Scripted>,
    executed: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with no scripted statements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the result returned for `sql`.
    pub fn with_result(mut self, sql: impl Into<String>, result: QueryResult) -> Self {
        self.scripted.insert(sql.into(), Scripted::Result(result));
        self
    }

    /// Scripts a failure for `sql`.
    pub fn with_error(mut self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        self.scripted
            .insert(sql.into(), Scripted::Error(message.into()));
        self
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }

        match self.scripted.get(sql) {
            Some(Scripted::Result(result)) => return Ok(result.clone()),
            Some(Scripted::Error(message)) => return Err(DiagnosticsError::query(message.clone())),
            None => {}
        }

        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            let columns = vec![ColumnInfo::new("result", "text")];
            let rows = vec![vec![Value::String(format!("Mock result for: {sql}"))]];
            Ok(QueryResult::with_data(columns, rows).with_execution_time(Duration::from_millis(1)))
        } else {
            Ok(QueryResult::new().with_execution_time(Duration::from_millis(1)))
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A client whose every statement fails, for exercising error paths.
#[derive(Debug, Default, Clone)]
pub struct FailingDatabaseClient {
    fail_ping: bool,
    closed: Arc<AtomicBool>,
}

impl FailingDatabaseClient {
    /// Creates a client whose queries fail but whose liveness check succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client that also fails the liveness check.
    pub fn unreachable() -> Self {
        Self {
            fail_ping: true,
            ..Default::default()
        }
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn ping(&self) -> Result<()> {
        if self.fail_ping {
            Err(DiagnosticsError::connection("Liveness check failed: server unreachable"))
        } else {
            Ok(())
        }
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        Err(DiagnosticsError::query(format!("Mock failure for: {sql}")))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
