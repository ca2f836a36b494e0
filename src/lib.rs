//! sql-diagnostics - runs a catalog of SQL Server diagnostic queries and
//! writes the results to a workbook.
//!
//! This library exposes the core modules for use by the binary and the
//! integration tests.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod db;
pub mod error;
pub mod logging;
pub mod naming;
pub mod query;
pub mod report;
pub mod safety;
pub mod sink;
