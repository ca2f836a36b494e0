//! Integration tests for sql-diagnostics.

pub mod common;
pub mod mssql_test;
pub mod pipeline_test;
pub mod schedule_test;
