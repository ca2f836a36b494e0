//! Direct-to-workbook sink.

use super::{fit_cell, index_rows, remove_existing, TabularSink, MAX_SHEET_COLUMNS, MAX_SHEET_ROWS};
use crate::catalog::QueryCatalog;
use crate::error::{DiagnosticsError, Result};
use crate::naming::{sheet_name, INDEX_HEADER, INDEX_UNIT_NAME};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Worksheet being filled.
struct Unit {
    sheet: Worksheet,
    name: String,
    next_row: u32,
    dropped_rows: u64,
    truncated_cells: u64,
    dropped_columns: usize,
}

impl Unit {
    fn new(name: &str) -> Result<Self> {
        let mut sheet = Worksheet::new();
        sheet.set_name(name).map_err(|e| sheet_error(name, e))?;
        Ok(Self {
            sheet,
            name: name.to_string(),
            next_row: 0,
            dropped_rows: 0,
            truncated_cells: 0,
            dropped_columns: 0,
        })
    }

    fn write_cells<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<()> {
        if self.next_row >= MAX_SHEET_ROWS {
            self.dropped_rows += 1;
            return Ok(());
        }
        if cells.len() > MAX_SHEET_COLUMNS {
            self.dropped_columns = self.dropped_columns.max(cells.len() - MAX_SHEET_COLUMNS);
        }

        let row = self.next_row;
        for (col, text) in cells.iter().take(MAX_SHEET_COLUMNS).enumerate() {
            let text = text.as_ref();
            let fitted = fit_cell(text);
            if fitted.len() < text.len() {
                self.truncated_cells += 1;
            }
            // Bounded by MAX_SHEET_COLUMNS above.
            let col = col as u16;
            self.sheet
                .write_string(row, col, fitted)
                .map_err(|e| sheet_error(&self.name, e))?;
        }
        self.next_row += 1;
        Ok(())
    }

    fn close(self) -> Worksheet {
        if self.dropped_rows > 0 {
            warn!(
                "Sheet {}: {} rows past the worksheet limit were dropped",
                self.name, self.dropped_rows
            );
        }
        if self.truncated_cells > 0 {
            warn!(
                "Sheet {}: {} cells were truncated to the worksheet cell limit",
                self.name, self.truncated_cells
            );
        }
        if self.dropped_columns > 0 {
            warn!(
                "Sheet {}: {} columns past the worksheet limit were dropped",
                self.name, self.dropped_columns
            );
        }
        debug!("Sheet {} holds {} rows", self.name, self.next_row);
        self.sheet
    }
}

fn sheet_error(name: &str, e: XlsxError) -> DiagnosticsError {
    DiagnosticsError::sink(format!("Worksheet {name}: {e}"))
}

/// Sink that writes each unit straight into a worksheet.
///
/// The index worksheet is kept apart and always placed first.
#[derive(Default)]
pub struct WorkbookSink {
    index: Option<Worksheet>,
    sheets: Vec<Worksheet>,
    current: Option<Unit>,
}

impl WorkbookSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a worksheet with an already sanitized name.
    pub(crate) fn begin_sheet(&mut self, name: &str) -> Result<()> {
        self.close_current();
        self.current = Some(Unit::new(name)?);
        Ok(())
    }

    /// Writes any row, header or data, to the current worksheet.
    pub(crate) fn write_cells<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<()> {
        self.current
            .as_mut()
            .ok_or_else(|| DiagnosticsError::sink("No worksheet has been started"))?
            .write_cells(cells)
    }

    /// Installs a finished index worksheet.
    pub(crate) fn write_index_rows<S: AsRef<str>>(&mut self, rows: &[Vec<S>]) -> Result<()> {
        self.close_current();
        let mut unit = Unit::new(INDEX_UNIT_NAME)?;
        for row in rows {
            unit.write_cells(row)?;
        }
        self.index = Some(unit.close());
        Ok(())
    }

    /// Number of worksheets written so far, index included.
    pub fn sheet_count(&self) -> usize {
        usize::from(self.index.is_some()) + self.sheets.len() + usize::from(self.current.is_some())
    }

    fn close_current(&mut self) {
        if let Some(unit) = self.current.take() {
            self.sheets.push(unit.close());
        }
    }

    /// Saves the workbook, replacing any file already at `artifact`.
    pub(crate) fn save(mut self, artifact: &Path) -> Result<PathBuf> {
        self.close_current();

        let mut workbook = Workbook::new();
        if let Some(index) = self.index.take() {
            workbook.push_worksheet(index);
        }
        for sheet in self.sheets {
            workbook.push_worksheet(sheet);
        }

        if let Some(parent) = artifact.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DiagnosticsError::sink(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        remove_existing(artifact)?;
        workbook.save(artifact).map_err(|e| {
            DiagnosticsError::sink(format!("Failed to save {}: {e}", artifact.display()))
        })?;

        info!("Saved {}", artifact.display());
        Ok(artifact.to_path_buf())
    }
}

impl TabularSink for WorkbookSink {
    fn write_index(&mut self, catalog: &QueryCatalog) -> Result<()> {
        let mut rows: Vec<Vec<String>> = vec![INDEX_HEADER.iter().map(|h| h.to_string()).collect()];
        rows.extend(index_rows(catalog).into_iter().map(Vec::from));
        self.write_index_rows(&rows)
    }

    fn begin_unit(&mut self, position: usize, raw_name: &str) -> Result<()> {
        self.begin_sheet(&sheet_name(position, raw_name))
    }

    fn write_header(&mut self, columns: &[String]) -> Result<()> {
        self.write_cells(columns)
    }

    fn write_row(&mut self, cells: &[String]) -> Result<()> {
        self.write_cells(cells)
    }

    fn finish(self: Box<Self>, artifact: &Path) -> Result<PathBuf> {
        (*self).save(artifact)
    }
}
