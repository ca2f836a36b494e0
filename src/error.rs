//! Error types for sql-diagnostics.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for report operations.
#[derive(Error, Debug)]
pub enum DiagnosticsError {
    /// The configuration file does not exist.
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    /// The configuration is unreadable, incomplete, or holds invalid values.
    #[error("Configuration error: {0}")]
    ConfigMalformed(String),

    /// The query catalog could not be read.
    #[error("Catalog read error: {0}")]
    CatalogRead(String),

    /// The query catalog does not match the expected document shape.
    #[error("Catalog parse error: {0}")]
    CatalogParse(String),

    /// Database connection errors (host unreachable, auth failed, liveness check failed).
    #[error("Connection error: {0}")]
    Connection(String),

    /// A catalog statement failed to execute or its result metadata was unavailable.
    #[error("Query error: {0}")]
    QueryExecution(String),

    /// A single result row could not be decoded.
    #[error("Row decode error: {0}")]
    RowDecode(String),

    /// The output artifact (or a staging file) could not be created, written, or persisted.
    #[error("Output error: {0}")]
    SinkWrite(String),

    /// The operator did not confirm the run.
    #[error("Run not confirmed: {0}")]
    NotConfirmed(String),

    /// An interrupt was received and the run stopped at a safe point.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl DiagnosticsError {
    /// Creates a missing-configuration error with the given message.
    pub fn config_missing(msg: impl Into<String>) -> Self {
        Self::ConfigMissing(msg.into())
    }

    /// Creates a malformed-configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigMalformed(msg.into())
    }

    /// Creates a catalog read error with the given message.
    pub fn catalog_read(msg: impl Into<String>) -> Self {
        Self::CatalogRead(msg.into())
    }

    /// Creates a catalog parse error with the given message.
    pub fn catalog_parse(msg: impl Into<String>) -> Self {
        Self::CatalogParse(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query execution error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryExecution(msg.into())
    }

    /// Creates a row decode error with the given message.
    pub fn row_decode(msg: impl Into<String>) -> Self {
        Self::RowDecode(msg.into())
    }

    /// Creates an output error with the given message.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::SinkWrite(msg.into())
    }

    /// Creates a not-confirmed error with the given message.
    pub fn not_confirmed(msg: impl Into<String>) -> Self {
        Self::NotConfirmed(msg.into())
    }

    /// Creates a cancellation error with the given message.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigMissing(_) => "Configuration Missing",
            Self::ConfigMalformed(_) => "Configuration Error",
            Self::CatalogRead(_) => "Catalog Read Error",
            Self::CatalogParse(_) => "Catalog Parse Error",
            Self::Connection(_) => "Connection Error",
            Self::QueryExecution(_) => "Query Error",
            Self::RowDecode(_) => "Row Decode Error",
            Self::SinkWrite(_) => "Output Error",
            Self::NotConfirmed(_) => "Not Confirmed",
            Self::Cancelled(_) => "Cancelled",
        }
    }

    /// Returns true if this error ends the run.
    ///
    /// Only a failing catalog entry or a single undecodable row is recovered locally.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::QueryExecution(_) | Self::RowDecode(_))
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotConfirmed(_) => 2,
            Self::Cancelled(_) => 130,
            _ => 1,
        }
    }
}

/// Result type alias using DiagnosticsError.
pub type Result<T> = std::result::Result<T, DiagnosticsError>;
