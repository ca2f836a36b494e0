//! Report runs against a live SQL Server.
//!
//! Set MSSQL_CONNECTION_STRING (ADO format) to run these tests.

use super::common::{catalog_json, read_sheet, sheet_names, Fixture};
use sql_diagnostics::confirm::Confirmation;
use sql_diagnostics::report::ReportRunner;
use sql_diagnostics::sink::SinkKind;
use tokio_util::sync::CancellationToken;

fn live_connection_string() -> Option<String> {
    std::env::var("MSSQL_CONNECTION_STRING").ok()
}

#[tokio::test]
async fn test_live_dmv_report() {
    let Some(conn_str) = live_connection_string() else {
        eprintln!("Skipping test: MSSQL_CONNECTION_STRING not set");
        return;
    };

    let fixture = Fixture::new(
        &conn_str,
        &catalog_json(&[
            ("Version Info", "SELECT @@SERVERNAME AS [Server Name], @@VERSION AS [SQL Server and OS Version Info]"),
            ("Core Counts", "SELECT cpu_count AS [Logical CPU Count] FROM sys.dm_os_sys_info WITH (NOLOCK) OPTION (RECOMPILE)"),
            ("Broken", "SELECT * FROM sys.no_such_view"),
            ("Five", "SELECT 5 AS X"),
        ]),
    );

    let summary = ReportRunner::with_default_connector(fixture.settings.clone())
        .run_once(&Confirmation::assumed(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!((summary.executed, summary.failed), (3, 1));
    assert_eq!(
        sheet_names(&summary.artifact),
        vec!["executed_queries", "1_Version_Info", "2_Core_Counts", "4_Five"]
    );
    assert_eq!(
        read_sheet(&summary.artifact, "4_Five"),
        vec![vec!["X".to_string()], vec!["5".to_string()]]
    );
    // Version text spans several lines on the server.
    let version = read_sheet(&summary.artifact, "1_Version_Info");
    assert!(!version[1][1].contains('\n'));
}

#[tokio::test]
async fn test_live_csv_staging() {
    let Some(conn_str) = live_connection_string() else {
        eprintln!("Skipping test: MSSQL_CONNECTION_STRING not set");
        return;
    };

    let fixture = Fixture::new(&conn_str, &catalog_json(&[("Databases", "SELECT name FROM sys.databases")]));
    let settings = sql_diagnostics::config::ReportSettings {
        sink: SinkKind::Csv,
        ..fixture.settings.clone()
    };

    let summary = ReportRunner::with_default_connector(settings)
        .run_once(&Confirmation::assumed(), &CancellationToken::new())
        .await
        .unwrap();

    let databases = read_sheet(&summary.artifact, "1_Databases");
    assert_eq!(databases[0], vec!["name".to_string()]);
    assert!(databases.iter().any(|row| row[0] == "master"));
}
