//! Repeat scheduling of whole report runs.
//!
//! Uses a mock connection so the paused tokio clock is never raced by real IO.

use super::common::{catalog_json, sheet_names, Fixture};
use async_trait::async_trait;
use sql_diagnostics::config::{ConnectionConfig, ReportSettings};
use sql_diagnostics::confirm::Confirmation;
use sql_diagnostics::db::{DatabaseClient, MockDatabaseClient};
use sql_diagnostics::error::{DiagnosticsError, Result};
use sql_diagnostics::report::{Connector, RepeatSchedule, ReportRunner};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Counts connections and hands out clones of one mock.
#[derive(Clone, Default)]
struct CountingConnector {
    db: MockDatabaseClient,
    connections: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.db.clone()))
    }
}

fn fixture() -> Fixture {
    Fixture::new(
        "server=tcp:db01,1433;IntegratedSecurity=true",
        &catalog_json(&[("Version", "SELECT @@VERSION AS version")]),
    )
}

#[tokio::test(start_paused = true)]
async fn test_fifteen_minutes_for_two_hours_runs_eight_times() {
    let fixture = fixture();
    let connector = CountingConnector::default();
    let settings = ReportSettings {
        schedule: RepeatSchedule::from_minutes_hours(15, 2).unwrap(),
        ..fixture.settings.clone()
    };
    let runner = ReportRunner::new(settings, Box::new(connector.clone()));
    let start = Instant::now();

    let summaries = runner
        .run_schedule(&Confirmation::assumed(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summaries.len(), 8);
    assert_eq!(connector.connections.load(Ordering::SeqCst), 8);
    assert_eq!(connector.db.executed().len(), 8);
    // Seven sleeps of fifteen minutes, none after the last run.
    assert_eq!(start.elapsed(), Duration::from_secs(7 * 15 * 60));

    let last = summaries.last().unwrap();
    assert_eq!(
        sheet_names(&last.artifact),
        vec!["executed_queries", "1_Version"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_runs_once_without_sleeping() {
    let fixture = fixture();
    let connector = CountingConnector::default();
    let settings = ReportSettings {
        schedule: RepeatSchedule::from_minutes_hours(0, 2).unwrap(),
        ..fixture.settings.clone()
    };
    let runner = ReportRunner::new(settings, Box::new(connector.clone()));
    let start = Instant::now();

    let summaries = runner
        .run_schedule(&Confirmation::assumed(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_sleep_stops_the_schedule() {
    let fixture = fixture();
    let connector = CountingConnector::default();
    let settings = ReportSettings {
        schedule: RepeatSchedule::from_minutes_hours(15, 2).unwrap(),
        ..fixture.settings.clone()
    };
    let runner = ReportRunner::new(settings, Box::new(connector.clone()));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(20 * 60)).await;
        trigger.cancel();
    });

    let err = runner
        .run_schedule(&Confirmation::assumed(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, DiagnosticsError::Cancelled(_)));
    assert_eq!(err.exit_code(), 130);
    // Runs at 0 and 15 minutes; cancelled during the second sleep.
    assert_eq!(connector.connections.load(Ordering::SeqCst), 2);
    assert!(connector.db.is_closed());
}
