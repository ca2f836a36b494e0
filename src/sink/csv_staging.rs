//! Stage-then-merge sink.
//!
//! Every unit is written to `<position>_<name>.csv` inside a private temporary
//! directory. At the end the staged files are read back, ordered by their
//! numeric prefix and merged into the workbook, index first.

use super::{index_rows, TabularSink, WorkbookSink};
use crate::catalog::QueryCatalog;
use crate::error::{DiagnosticsError, Result};
use crate::naming::{
    index_staging_file_name, parse_numbered_stem, sheet_name, staging_file_name, INDEX_HEADER,
    INDEX_UNIT_NAME, STAGING_EXTENSION,
};
use csv::{ReaderBuilder, Writer, WriterBuilder};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Sink that stages units as CSV files before building the workbook.
///
/// The staging directory is removed when the sink is dropped.
pub struct CsvStagingSink {
    dir: TempDir,
    current: Option<Writer<File>>,
}

impl CsvStagingSink {
    /// Allocates a fresh staging directory for this run.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("sql_diagnostics_")
            .tempdir()
            .map_err(|e| DiagnosticsError::sink(format!("Failed to create staging directory: {e}")))?;
        debug!("Staging units in {}", dir.path().display());
        Ok(Self { dir, current: None })
    }

    /// Directory holding the staged files.
    pub fn staging_dir(&self) -> &Path {
        self.dir.path()
    }

    fn start_file(&mut self, file_name: &str) -> Result<()> {
        self.flush_current()?;
        let path = self.dir.path().join(file_name);
        let writer = WriterBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(|e| DiagnosticsError::sink(format!("Failed to create {}: {e}", path.display())))?;
        self.current = Some(writer);
        Ok(())
    }

    fn flush_current(&mut self) -> Result<()> {
        if let Some(mut writer) = self.current.take() {
            writer
                .flush()
                .map_err(|e| DiagnosticsError::sink(format!("Failed to flush staging file: {e}")))?;
        }
        Ok(())
    }

    fn write_record<S: AsRef<str>>(&mut self, record: &[S]) -> Result<()> {
        // An empty record would be staged as a single empty field.
        if record.is_empty() {
            return Ok(());
        }
        self.current
            .as_mut()
            .ok_or_else(|| DiagnosticsError::sink("No staging file has been started"))?
            .write_record(record.iter().map(|field| field.as_ref()))
            .map_err(|e| DiagnosticsError::sink(format!("Failed to write staging row: {e}")))
    }
}

impl TabularSink for CsvStagingSink {
    fn write_index(&mut self, catalog: &QueryCatalog) -> Result<()> {
        self.start_file(&index_staging_file_name())?;
        self.write_record(&INDEX_HEADER)?;
        for row in index_rows(catalog) {
            self.write_record(&row)?;
        }
        self.flush_current()
    }

    fn begin_unit(&mut self, position: usize, raw_name: &str) -> Result<()> {
        self.start_file(&staging_file_name(position, raw_name))
    }

    fn write_header(&mut self, columns: &[String]) -> Result<()> {
        self.write_record(columns)
    }

    fn write_row(&mut self, cells: &[String]) -> Result<()> {
        self.write_record(cells)
    }

    fn finish(mut self: Box<Self>, artifact: &Path) -> Result<PathBuf> {
        self.flush_current()?;
        merge_staging_dir(self.dir.path(), artifact)
    }
}

/// Merges the staged files in `dir` into a workbook at `artifact`.
///
/// `executed_queries.csv` becomes the first sheet. Files named
/// `<position>_<name>.csv` follow in ascending position order. A file that
/// cannot be read is skipped with a warning. All staged files are deleted
/// once the workbook has been saved.
pub fn merge_staging_dir(dir: &Path, artifact: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)
        .map_err(|e| DiagnosticsError::sink(format!("Failed to read {}: {e}", dir.display())))?;

    let mut staged = Vec::new();
    let mut index = None;
    let mut units = Vec::new();

    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("Skipping unreadable staging entry: {e}");
                continue;
            }
        };
        if path.extension() != Some(OsStr::new(STAGING_EXTENSION)) {
            continue;
        }
        staged.push(path.clone());

        let Some(stem) = path.file_stem().and_then(OsStr::to_str) else {
            warn!("Skipping {}: file name is not valid UTF-8", path.display());
            continue;
        };
        if stem == INDEX_UNIT_NAME {
            index = Some(path);
            continue;
        }
        match parse_numbered_stem(stem) {
            Some((position, rest)) => units.push((position, sheet_name(position, rest), path)),
            None => warn!("Skipping {}: no numeric prefix", path.display()),
        }
    }

    units.sort_by_key(|(position, _, _)| *position);

    let mut workbook = WorkbookSink::new();
    match &index {
        Some(path) => match read_records(path) {
            Ok(rows) => workbook.write_index_rows(&rows)?,
            Err(e) => warn!("Skipping {}: {e}", path.display()),
        },
        None => warn!("No {} in {}", index_staging_file_name(), dir.display()),
    }

    for (_, name, path) in &units {
        match read_records(path) {
            Ok(rows) => {
                debug!("Adding sheet {name}");
                workbook.begin_sheet(name)?;
                for row in &rows {
                    workbook.write_cells(row)?;
                }
            }
            Err(e) => warn!("Skipping {}: {e}", path.display()),
        }
    }

    let saved = workbook.save(artifact)?;

    for path in &staged {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to delete {}: {e}", path.display());
        }
    }

    Ok(saved)
}

/// Reads every record of a staging file; any malformed record fails the file.
fn read_records(path: &Path) -> std::result::Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect()
}
