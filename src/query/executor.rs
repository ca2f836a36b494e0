//! Query execution with safety classification.
//!
//! Runs one catalog entry against an open connection. Isolated from the
//! report runner so it can be tested on its own.

use std::time::{Duration, Instant};

use crate::catalog::QueryDefinition;
use crate::db::{DatabaseClient, QueryResult};
use crate::error::DiagnosticsError;
use crate::safety::{classify_sql, ClassificationResult, SafetyLevel, SafetyPolicy};
use tracing::{debug, warn};

/// Query executor that classifies and executes catalog entries.
pub struct QueryExecutor<'a> {
    db: &'a dyn DatabaseClient,
    policy: SafetyPolicy,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new query executor.
    pub fn new(db: &'a dyn DatabaseClient, policy: SafetyPolicy) -> Self {
        Self { db, policy }
    }

    /// Classifies and, unless the policy forbids it, executes the entry at `position`.
    pub async fn execute(&self, position: usize, query: &QueryDefinition) -> ExecutionResult {
        let classification = classify_sql(&query.statement);

        if self.policy.blocks(&classification) {
            return ExecutionResult::Blocked(classification);
        }

        match classification.level {
            SafetyLevel::Safe => {}
            SafetyLevel::Unverified => debug!(
                "Query {position} ({}) could not be verified as read-only: {}",
                query.name,
                classification.note.as_deref().unwrap_or("opaque statement")
            ),
            SafetyLevel::Mutating | SafetyLevel::Destructive => {
                warn!(
                    "Query {position} ({}) is {} ({})",
                    query.name, classification.level, classification.statement_type
                );
            }
        }

        let start = Instant::now();
        match self.db.execute_query(&query.statement).await {
            Ok(result) => {
                if result.skipped_rows > 0 {
                    warn!(
                        "Query {position} ({}): {} rows could not be decoded and were skipped",
                        query.name, result.skipped_rows
                    );
                }
                ExecutionResult::Success(QueryOutcome {
                    result,
                    classification,
                    execution_time: start.elapsed(),
                })
            }
            Err(e) => ExecutionResult::Error(DiagnosticsError::query(format!(
                "Query {position} ({}): {e}",
                query.name
            ))),
        }
    }
}

/// Outcome of a successfully executed entry.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub result: QueryResult,
    pub classification: ClassificationResult,
    pub execution_time: Duration,
}

/// Result of running one catalog entry.
#[derive(Debug)]
pub enum ExecutionResult {
    /// Statement ran; its first result set is attached.
    Success(QueryOutcome),
    /// Statement is not verifiably read-only and the safety policy is read-only.
    Blocked(ClassificationResult),
    /// Statement failed on the server.
    Error(DiagnosticsError),
}
