//! Integration tests for sql-diagnostics.
//!
//! The pipeline tests run against in-memory SQLite and need no server.
//! Tests against SQL Server are skipped unless MSSQL_CONNECTION_STRING is set.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
