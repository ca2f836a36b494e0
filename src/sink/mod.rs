//! Output units and the final workbook.
//!
//! A sink receives the index unit first, then one unit per executed catalog
//! entry, and assembles the workbook in [`TabularSink::finish`]. Two
//! realizations exist: [`WorkbookSink`] writes worksheets directly, while
//! [`CsvStagingSink`] stages each unit as a CSV file and merges them at the end.

mod csv_staging;
mod workbook;

pub use csv_staging::{merge_staging_dir, CsvStagingSink};
pub use workbook::WorkbookSink;

use crate::catalog::QueryCatalog;
use crate::db::{render_row, QueryResult};
use crate::error::{DiagnosticsError, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Longest text a worksheet cell can hold, in characters.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Rows per worksheet, header included.
pub const MAX_SHEET_ROWS: u32 = 1_048_576;

/// Columns per worksheet.
pub const MAX_SHEET_COLUMNS: usize = 16_384;

/// Which sink realization a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SinkKind {
    /// Worksheets are written directly into the workbook.
    #[default]
    Workbook,
    /// Units are staged as CSV files in a private directory, then merged.
    Csv,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workbook => "workbook",
            Self::Csv => "csv",
        }
    }
}

impl std::str::FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "workbook" | "xlsx" => Ok(Self::Workbook),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Invalid sink: {s}. Expected: workbook or csv")),
        }
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Destination for the units of one run.
///
/// Calls arrive in order: `write_index`, then for each unit `begin_unit`,
/// `write_header` and any number of `write_row`, and finally `finish`.
pub trait TabularSink {
    /// Writes the index unit listing every catalog entry.
    fn write_index(&mut self, catalog: &QueryCatalog) -> Result<()>;

    /// Starts the unit for the catalog entry at `position`.
    fn begin_unit(&mut self, position: usize, raw_name: &str) -> Result<()>;

    /// Writes the header row of the current unit.
    fn write_header(&mut self, columns: &[String]) -> Result<()>;

    /// Writes one data row of the current unit.
    fn write_row(&mut self, cells: &[String]) -> Result<()>;

    /// Assembles and persists the workbook at `artifact`, returning its path.
    fn finish(self: Box<Self>, artifact: &Path) -> Result<PathBuf>;
}

/// Creates the sink for `kind`.
pub fn open_sink(kind: SinkKind) -> Result<Box<dyn TabularSink>> {
    match kind {
        SinkKind::Workbook => Ok(Box::new(WorkbookSink::new())),
        SinkKind::Csv => Ok(Box::new(CsvStagingSink::new()?)),
    }
}

/// Writes a complete query result as one unit.
pub fn write_result(
    sink: &mut dyn TabularSink,
    position: usize,
    raw_name: &str,
    result: &QueryResult,
) -> Result<()> {
    sink.begin_unit(position, raw_name)?;
    sink.write_header(&result.column_names())?;
    for row in &result.rows {
        sink.write_row(&render_row(row))?;
    }
    Ok(())
}

/// Rows of the index unit: position, statement text, notes.
pub fn index_rows(catalog: &QueryCatalog) -> Vec<[String; 3]> {
    catalog
        .entries()
        .map(|(position, query)| {
            [
                position.to_string(),
                query.statement.clone(),
                query.notes.clone(),
            ]
        })
        .collect()
}

/// Cuts text down to what a worksheet cell can hold.
pub fn fit_cell(text: &str) -> Cow<'_, str> {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => Cow::Owned(text[..cut].to_string()),
        None => Cow::Borrowed(text),
    }
}

/// Deletes an artifact left by an earlier run within the same second.
fn remove_existing(artifact: &Path) -> Result<()> {
    if artifact.exists() {
        warn!("Replacing existing {}", artifact.display());
        std::fs::remove_file(artifact).map_err(|e| {
            DiagnosticsError::sink(format!("Failed to remove {}: {e}", artifact.display()))
        })?;
    }
    Ok(())
}
