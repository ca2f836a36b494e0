//! Operator confirmation before any statement runs.
//!
//! A [`Confirmation`] can only be obtained from `--yes` or from an operator
//! typing `YES` at the prompt, and the report runner requires one.

use crate::error::{DiagnosticsError, Result};
use std::io::{BufRead, Write};

/// Text the operator must type to start the run.
pub const CONFIRMATION_TEXT: &str = "YES";

/// How the run was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationSource {
    /// `--yes` was passed.
    Flag,
    /// The operator answered the prompt.
    Prompt,
}

/// Proof that the operator agreed to run the catalog against the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    source: ConfirmationSource,
}

impl Confirmation {
    /// Confirmation given up front with `--yes`.
    pub fn assumed() -> Self {
        Self {
            source: ConfirmationSource::Flag,
        }
    }

    pub fn source(&self) -> ConfirmationSource {
        self.source
    }
}

/// Describes the run and waits for the operator to type `YES`.
///
/// Surrounding whitespace is ignored; anything else, including end of input,
/// is a refusal.
pub fn prompt_confirmation<R: BufRead, W: Write>(
    mut reader: R,
    mut writer: W,
    target: &str,
    catalog: &str,
) -> Result<Confirmation> {
    let io_err = |e: std::io::Error| DiagnosticsError::not_confirmed(format!("Prompt failed: {e}"));

    writeln!(writer, "Target:  {target}").map_err(io_err)?;
    writeln!(writer, "Catalog: {catalog}").map_err(io_err)?;
    writeln!(
        writer,
        "Every query in the catalog will be executed against the target."
    )
    .map_err(io_err)?;
    write!(writer, "Type {CONFIRMATION_TEXT} to continue: ").map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    let mut answer = String::new();
    reader.read_line(&mut answer).map_err(io_err)?;

    if answer.trim() == CONFIRMATION_TEXT {
        Ok(Confirmation {
            source: ConfirmationSource::Prompt,
        })
    } else {
        Err(DiagnosticsError::not_confirmed(format!(
            "expected {CONFIRMATION_TEXT}, got '{}'",
            answer.trim()
        )))
    }
}
