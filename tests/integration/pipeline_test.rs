//! End-to-end report runs against in-memory SQLite.

use super::common::{catalog_json, read_sheet, sheet_names, Fixture};
use pretty_assertions::assert_eq;
use sql_diagnostics::config::ReportSettings;
use sql_diagnostics::confirm::Confirmation;
use sql_diagnostics::error::DiagnosticsError;
use sql_diagnostics::naming::{sheet_name, MAX_SHEET_NAME_LEN};
use sql_diagnostics::report::{FailurePolicy, ReportRunner, RunSummary};
use sql_diagnostics::safety::SafetyPolicy;
use sql_diagnostics::sink::SinkKind;
use tokio_util::sync::CancellationToken;

async fn run(settings: ReportSettings) -> sql_diagnostics::error::Result<RunSummary> {
    ReportRunner::with_default_connector(settings)
        .run_once(&Confirmation::assumed(), &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_one_sheet_per_entry_after_the_index() {
    let fixture = Fixture::sqlite(&catalog_json(&[
        ("Sample Query Name!", "SELECT 5 AS X"),
        ("Engine Version", "SELECT sqlite_version() AS version"),
        ("Pragmas", "SELECT 'a' AS k, 1 AS v UNION ALL SELECT 'b', 2"),
    ]));

    let summary = run(fixture.settings.clone()).await.unwrap();

    assert_eq!((summary.executed, summary.failed, summary.skipped), (3, 0, 0));
    assert_eq!(
        sheet_names(&summary.artifact),
        vec![
            "executed_queries",
            "1_Sample_Query_Name",
            "2_Engine_Version",
            "3_Pragmas"
        ]
    );
    assert_eq!(fixture.artifacts().len(), 1);
}

#[tokio::test]
async fn test_single_value_round_trip() {
    let fixture = Fixture::sqlite(&catalog_json(&[("Five", "SELECT 5 AS X")]));

    let summary = run(fixture.settings.clone()).await.unwrap();

    assert_eq!(
        read_sheet(&summary.artifact, "1_Five"),
        vec![vec!["X".to_string()], vec!["5".to_string()]]
    );
}

#[tokio::test]
async fn test_index_lists_statement_text_and_notes() {
    let fixture = Fixture::sqlite(&catalog_json(&[
        ("First", "SELECT 1 AS one"),
        ("Second", "SELECT 2 AS two"),
    ]));

    let summary = run(fixture.settings.clone()).await.unwrap();

    assert_eq!(
        read_sheet(&summary.artifact, "executed_queries"),
        vec![
            vec!["Sr.No", "Query", "Query Notes"],
            vec!["1", "SELECT 1 AS one", "First notes"],
            vec!["2", "SELECT 2 AS two", "Second notes"],
        ]
    );
}

#[tokio::test]
async fn test_null_and_line_breaks_are_rendered_as_text() {
    let fixture = Fixture::sqlite(&catalog_json(&[(
        "Rendering",
        "SELECT NULL AS n, 'line1' || char(10) || 'line2' || char(13) || 'end' AS t, x'4869' AS b",
    )]));

    let summary = run(fixture.settings.clone()).await.unwrap();

    assert_eq!(
        read_sheet(&summary.artifact, "1_Rendering"),
        vec![vec!["n", "t", "b"], vec!["NULL", "line1 line2 end", "Hi"]]
    );
}

#[tokio::test]
async fn test_failing_entry_does_not_stop_the_run() {
    let fixture = Fixture::sqlite(&catalog_json(&[
        ("Before", "SELECT 1 AS before"),
        ("Broken", "SELECT * FROM no_such_table"),
        ("After", "SELECT 3 AS after"),
    ]));

    let summary = run(fixture.settings.clone()).await.unwrap();

    assert_eq!((summary.executed, summary.failed), (2, 1));
    assert_eq!(
        sheet_names(&summary.artifact),
        vec!["executed_queries", "1_Before", "3_After"]
    );
    assert_eq!(
        read_sheet(&summary.artifact, "3_After"),
        vec![vec!["after".to_string()], vec!["3".to_string()]]
    );
    // The index still records every entry, including the failed one.
    assert_eq!(read_sheet(&summary.artifact, "executed_queries").len(), 4);
}

#[tokio::test]
async fn test_strict_mode_stops_without_an_artifact() {
    let fixture = Fixture::sqlite(&catalog_json(&[
        ("Broken", "SELECT * FROM no_such_table"),
        ("After", "SELECT 3 AS after"),
    ]));
    let settings = ReportSettings {
        failure_policy: FailurePolicy::AbortOnFirstFailure,
        ..fixture.settings.clone()
    };

    let err = run(settings).await.unwrap_err();

    assert!(matches!(err, DiagnosticsError::QueryExecution(_)));
    assert!(err.to_string().contains("Query 1 (Broken)"));
    assert!(fixture.artifacts().is_empty());
}

#[tokio::test]
async fn test_statements_without_result_sets_get_empty_sheets() {
    let fixture = Fixture::sqlite(&catalog_json(&[
        ("Setup", "CREATE TABLE waits (name TEXT)"),
        ("Read", "SELECT name FROM waits"),
    ]));

    let summary = run(fixture.settings.clone()).await.unwrap();

    assert_eq!(summary.executed, 2);
    assert_eq!(
        sheet_names(&summary.artifact),
        vec!["executed_queries", "1_Setup", "2_Read"]
    );
    assert!(read_sheet(&summary.artifact, "1_Setup").is_empty());
    assert_eq!(
        read_sheet(&summary.artifact, "2_Read"),
        vec![vec!["name".to_string()]]
    );
}

#[tokio::test]
async fn test_read_only_mode_skips_writes_but_keeps_index_row() {
    let fixture = Fixture::sqlite(&catalog_json(&[
        ("Setup", "CREATE TABLE waits (name TEXT)"),
        ("Count", "SELECT 42 AS answer"),
    ]));
    let settings = ReportSettings {
        safety_policy: SafetyPolicy::ReadOnly,
        ..fixture.settings.clone()
    };

    let summary = run(settings).await.unwrap();

    assert_eq!((summary.executed, summary.skipped), (1, 1));
    assert_eq!(
        sheet_names(&summary.artifact),
        vec!["executed_queries", "2_Count"]
    );
    assert_eq!(read_sheet(&summary.artifact, "executed_queries").len(), 3);
}

#[tokio::test]
async fn test_csv_staging_matches_direct_workbook() {
    let entries = [
        ("Sample Query Name!", "SELECT 5 AS X"),
        (
            "A diagnostic query whose name is much too long",
            "SELECT 'a,b' AS quoted, NULL AS missing",
        ),
        ("Broken", "SELECT * FROM no_such_table"),
    ];
    let direct = Fixture::sqlite(&catalog_json(&entries));
    let staged = Fixture::sqlite(&catalog_json(&entries));
    let staged_settings = ReportSettings {
        sink: SinkKind::Csv,
        ..staged.settings.clone()
    };

    let direct_summary = run(direct.settings.clone()).await.unwrap();
    let staged_summary = run(staged_settings).await.unwrap();

    let names = sheet_names(&direct_summary.artifact);
    assert_eq!(names, sheet_names(&staged_summary.artifact));
    assert_eq!(names.len(), 3);
    for name in &names {
        assert_eq!(
            read_sheet(&direct_summary.artifact, name),
            read_sheet(&staged_summary.artifact, name),
            "sheet {name}"
        );
    }
}

#[tokio::test]
async fn test_long_names_are_truncated_and_unique() {
    let long = "Wait statistics grouped by category and resource";
    let fixture = Fixture::sqlite(&catalog_json(&[
        (long, "SELECT 1 AS a"),
        (long, "SELECT 2 AS b"),
    ]));

    let summary = run(fixture.settings.clone()).await.unwrap();

    let names = sheet_names(&summary.artifact);
    assert_eq!(names[1], sheet_name(1, long));
    assert_eq!(names[2], sheet_name(2, long));
    assert_ne!(names[1], names[2]);
    assert!(names.iter().all(|n| n.chars().count() <= MAX_SHEET_NAME_LEN));
}

#[tokio::test]
async fn test_empty_catalog_yields_index_only() {
    let fixture = Fixture::sqlite(r#"{"querysource": {}, "queries": []}"#);

    let summary = run(fixture.settings.clone()).await.unwrap();

    assert_eq!(sheet_names(&summary.artifact), vec!["executed_queries"]);
    assert_eq!(
        read_sheet(&summary.artifact, "executed_queries"),
        vec![vec!["Sr.No", "Query", "Query Notes"]]
    );
}

#[tokio::test]
async fn test_missing_catalog_is_fatal() {
    let fixture = Fixture::sqlite("{}");
    let settings = ReportSettings {
        catalog_path: fixture.dir.path().join("missing.json"),
        ..fixture.settings.clone()
    };

    let err = run(settings).await.unwrap_err();

    assert!(matches!(err, DiagnosticsError::CatalogRead(_)));
    assert!(fixture.artifacts().is_empty());
}

#[tokio::test]
async fn test_unreachable_database_is_fatal() {
    let fixture = Fixture::new(
        "sqlite:///definitely/not/here/diagnostics.db",
        &catalog_json(&[("Five", "SELECT 5 AS X")]),
    );

    let err = run(fixture.settings.clone()).await.unwrap_err();

    assert!(matches!(err, DiagnosticsError::Connection(_)));
    assert_eq!(err.exit_code(), 1);
}
