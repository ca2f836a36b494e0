//! Execution of individual catalog entries.
//!
//! This module isolates classification and execution of one statement from
//! the report runner.

pub mod executor;

pub use executor::{ExecutionResult, QueryExecutor, QueryOutcome};
