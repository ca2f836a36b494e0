//! Command-line argument parsing for sql-diagnostics.
//!
//! Uses clap to parse CLI arguments into [`ReportSettings`].

use crate::config::{ReportSettings, DEFAULT_CATALOG_PATH, DEFAULT_CONFIG_PATH};
use crate::error::{DiagnosticsError, Result};
use crate::report::{FailurePolicy, RepeatSchedule};
use crate::safety::SafetyPolicy;
use crate::sink::SinkKind;
use clap::Parser;
use std::path::PathBuf;

/// Runs a catalog of diagnostic queries against SQL Server and writes the
/// results to a workbook.
#[derive(Parser, Debug)]
#[command(name = "sql-diagnostics")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Connection properties file
    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        env = "SQL_DIAGNOSTICS_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,

    /// Query catalog file
    #[arg(
        short = 'q',
        long,
        value_name = "PATH",
        env = "SQL_DIAGNOSTICS_QUERIES",
        default_value = DEFAULT_CATALOG_PATH
    )]
    pub queries: PathBuf,

    /// Minutes between repeated runs (0 runs once)
    #[arg(
        short = 'i',
        long,
        value_name = "MINUTES",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub interval: i64,

    /// Hours to keep repeating (0 runs once)
    #[arg(
        short = 'd',
        long,
        value_name = "HOURS",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub duration: i64,

    /// Directory the workbook is written to
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// How results are staged: workbook or csv
    #[arg(long, value_name = "SINK", default_value = "workbook")]
    pub sink: String,

    /// Abort the run on the first failing query
    #[arg(long)]
    pub strict: bool,

    /// Skip queries that are not verifiably read-only
    #[arg(long)]
    pub read_only: bool,

    /// Do not prompt for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses the sink from the --sink argument.
    pub fn parse_sink(&self) -> std::result::Result<SinkKind, String> {
        self.sink.parse()
    }

    /// Validates the arguments and converts them into run settings.
    ///
    /// Negative interval or duration values are rejected here, before any run starts.
    pub fn to_settings(&self) -> Result<ReportSettings> {
        let schedule = RepeatSchedule::from_minutes_hours(self.interval, self.duration)?;
        let sink = self.parse_sink().map_err(DiagnosticsError::config)?;

        Ok(ReportSettings {
            config_path: self.config.clone(),
            catalog_path: self.queries.clone(),
            output_dir: self.output_dir.clone(),
            sink,
            failure_policy: if self.strict {
                FailurePolicy::AbortOnFirstFailure
            } else {
                FailurePolicy::SkipAndContinue
            },
            safety_policy: if self.read_only {
                SafetyPolicy::ReadOnly
            } else {
                SafetyPolicy::WarnOnly
            },
            schedule,
        })
    }
}
