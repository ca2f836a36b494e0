//! Report orchestration.
//!
//! One run loads the connection properties, connects, loads the catalog,
//! writes the index unit, executes every entry in catalog order into its own
//! unit and saves the workbook. The connection is closed on every path.

mod schedule;

pub use schedule::RepeatSchedule;

use crate::catalog::QueryCatalog;
use crate::config::{ConnectionConfig, ReportSettings};
use crate::confirm::Confirmation;
use crate::db::{self, DatabaseClient};
use crate::error::{DiagnosticsError, Result};
use crate::naming::artifact_file_name;
use crate::query::{ExecutionResult, QueryExecutor};
use crate::sink::{open_sink, write_result};
use async_trait::async_trait;
use chrono::Local;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a failing catalog entry does to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure, omit the entry's sheet and continue.
    #[default]
    SkipAndContinue,
    /// End the run with the entry's error.
    AbortOnFirstFailure,
}

/// Opens database connections for the runner.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection and verifies it is alive.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>>;
}

/// Connector backed by [`db::connect`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConnector;

#[async_trait]
impl Connector for DefaultConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        db::connect(config).await
    }
}

/// Outcome of one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Path of the saved workbook.
    pub artifact: PathBuf,
    /// Entries whose results were written.
    pub executed: usize,
    /// Entries that failed to execute.
    pub failed: usize,
    /// Entries not executed because they modify data.
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Drives report runs with fixed settings.
pub struct ReportRunner {
    settings: ReportSettings,
    connector: Box<dyn Connector>,
}

impl ReportRunner {
    pub fn new(settings: ReportSettings, connector: Box<dyn Connector>) -> Self {
        Self {
            settings,
            connector,
        }
    }

    /// Creates a runner that connects with [`DefaultConnector`].
    pub fn with_default_connector(settings: ReportSettings) -> Self {
        Self::new(settings, Box::new(DefaultConnector))
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Produces the report as many times as the schedule asks.
    pub async fn run_schedule(
        &self,
        confirmation: &Confirmation,
        cancel: &CancellationToken,
    ) -> Result<Vec<RunSummary>> {
        self.settings
            .schedule
            .run(cancel, |_| self.run_once(confirmation, cancel))
            .await
    }

    /// Produces the report once.
    pub async fn run_once(
        &self,
        confirmation: &Confirmation,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        debug!("Run confirmed via {:?}", confirmation.source());
        let started = Instant::now();

        let connection = ConnectionConfig::load_from_file(&self.settings.config_path)?;
        info!("Connecting to {}", connection.display_string());
        let client = self.connector.connect(&connection).await?;

        let outcome = self.produce(client.as_ref(), cancel, started).await;

        if let Err(e) = client.close().await {
            warn!("Failed to close connection: {e}");
        }
        outcome
    }

    async fn produce(
        &self,
        client: &dyn DatabaseClient,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<RunSummary> {
        let catalog = QueryCatalog::load_from_file(&self.settings.catalog_path)?;
        info!(
            "Loaded {} queries from {}",
            catalog.len(),
            self.settings.catalog_path.display()
        );
        if catalog.is_empty() {
            warn!("The catalog has no queries; the report holds only the index");
        }

        let mut sink = open_sink(self.settings.sink)?;
        sink.write_index(&catalog)?;

        let executor = QueryExecutor::new(client, self.settings.safety_policy);
        let (mut executed, mut failed, mut skipped) = (0, 0, 0);

        for (position, query) in catalog.entries() {
            if cancel.is_cancelled() {
                return Err(DiagnosticsError::cancelled(format!(
                    "Stopped before query {position} of {}",
                    catalog.len()
                )));
            }

            println!(
                "Executing Query: {}\nDescription: {}",
                query.name, query.description
            );
            debug!("Query: {}", query.statement);

            match executor.execute(position, query).await {
                ExecutionResult::Success(outcome) => {
                    write_result(sink.as_mut(), position, &query.name, &outcome.result)?;
                    info!(
                        "Query {position} returned {} rows in {:?}",
                        outcome.result.row_count(),
                        outcome.execution_time
                    );
                    executed += 1;
                }
                ExecutionResult::Blocked(classification) => {
                    warn!(
                        "Skipping query {position} ({}): {} {} statement not allowed in read-only mode",
                        query.name, classification.level, classification.statement_type
                    );
                    skipped += 1;
                }
                ExecutionResult::Error(e) => match self.settings.failure_policy {
                    FailurePolicy::SkipAndContinue => {
                        error!("{e}");
                        failed += 1;
                    }
                    FailurePolicy::AbortOnFirstFailure => return Err(e),
                },
            }
        }

        let artifact = self
            .settings
            .output_dir
            .join(artifact_file_name(Local::now().naive_local()));
        let artifact = sink.finish(&artifact)?;
        println!("Report written to {}", artifact.display());

        Ok(RunSummary {
            artifact,
            executed,
            failed,
            skipped,
            elapsed: started.elapsed(),
        })
    }
}
