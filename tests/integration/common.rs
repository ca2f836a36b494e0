//! Shared fixtures for the integration tests.

use calamine::{open_workbook, Reader, Xlsx};
use sql_diagnostics::config::ReportSettings;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A scratch directory holding a connection file, a catalog and the output dir.
pub struct Fixture {
    pub dir: TempDir,
    pub settings: ReportSettings,
}

impl Fixture {
    /// Builds a fixture whose connection file points at `connection_string`.
    pub fn new(connection_string: &str, catalog_json: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.properties");
        let catalog_path = dir.path().join("sql_queries.json");
        fs::write(
            &config_path,
            format!("# test connection\nDB_CONNECTION_STRING={connection_string}\n"),
        )
        .unwrap();
        fs::write(&catalog_path, catalog_json).unwrap();

        let settings = ReportSettings {
            config_path,
            catalog_path,
            output_dir: dir.path().join("reports"),
            ..Default::default()
        };
        Self { dir, settings }
    }

    /// Fixture backed by a fresh in-memory SQLite database per run.
    pub fn sqlite(catalog_json: &str) -> Self {
        Self::new("sqlite::memory:", catalog_json)
    }

    /// Workbooks currently in the output directory.
    pub fn artifacts(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.settings.output_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".xlsx"))
            .collect();
        names.sort();
        names
    }
}

/// Builds a catalog document from `(name, statement)` pairs.
pub fn catalog_json(entries: &[(&str, &str)]) -> String {
    let queries: Vec<serde_json::Value> = entries
        .iter()
        .map(|(name, statement)| {
            serde_json::json!({
                "name": name,
                "description": format!("{name} description"),
                "query": statement,
                "notes": format!("{name} notes"),
            })
        })
        .collect();

    serde_json::json!({
        "querysource": {
            "sqlserverversion": "SQL Server 2022",
            "name": "Integration catalog",
            "author": "tests",
            "lastmodified": "2024-01-01",
            "source": "",
            "url": "",
            "comments": "",
            "copyright": ""
        },
        "queries": queries,
    })
    .to_string()
}

/// Sheet names of a workbook, in order.
pub fn sheet_names(path: &Path) -> Vec<String> {
    let workbook: Xlsx<_> = open_workbook(path).unwrap();
    workbook.sheet_names()
}

/// All rows of one sheet as text.
pub fn read_sheet(path: &Path, name: &str) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    workbook
        .worksheet_range(name)
        .unwrap()
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}
