//! Statement safety audit.
//!
//! Diagnostic catalogs are expected to only read server state. Each catalog
//! statement is parsed and classified so that entries which write data can be
//! flagged, or skipped under [`SafetyPolicy::ReadOnly`].

mod classifier;

pub use classifier::{classify_sql, SqlClassifier};

use std::fmt;

/// Safety level of a catalog statement, ordered from harmless to dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SafetyLevel {
    /// Read-only (SELECT, EXPLAIN, SHOW, DECLARE).
    Safe,
    /// Could not be parsed or is opaque (procedure calls, DBCC, IF/BEGIN batches).
    /// Runs by default, skipped under [`SafetyPolicy::ReadOnly`].
    Unverified,
    /// Writes rows (INSERT, UPDATE, MERGE, SELECT INTO).
    Mutating,
    /// Removes data or changes schema or permissions.
    Destructive,
}

impl SafetyLevel {
    /// Returns true if the statement writes to the server.
    pub fn modifies_data(&self) -> bool {
        matches!(self, Self::Mutating | Self::Destructive)
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "Safe"),
            Self::Unverified => write!(f, "Unverified"),
            Self::Mutating => write!(f, "Mutating"),
            Self::Destructive => write!(f, "Destructive"),
        }
    }
}

/// The kind of statement that determined the classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementType {
    Select,
    SelectInto,
    Insert,
    Update,
    Delete,
    Merge,
    Drop,
    Truncate,
    Alter,
    Create,
    Grant,
    Revoke,
    Explain,
    Show,
    Declare,
    Execute,
    /// Multiple statements; contains the most dangerous type.
    Multiple(Box<StatementType>),
    Unknown,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::SelectInto => write!(f, "SELECT INTO"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Merge => write!(f, "MERGE"),
            Self::Drop => write!(f, "DROP"),
            Self::Truncate => write!(f, "TRUNCATE"),
            Self::Alter => write!(f, "ALTER"),
            Self::Create => write!(f, "CREATE"),
            Self::Grant => write!(f, "GRANT"),
            Self::Revoke => write!(f, "REVOKE"),
            Self::Explain => write!(f, "EXPLAIN"),
            Self::Show => write!(f, "SHOW"),
            Self::Declare => write!(f, "DECLARE"),
            Self::Execute => write!(f, "EXECUTE"),
            Self::Multiple(inner) => write!(f, "Multiple ({inner})"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result of classifying a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub level: SafetyLevel,
    pub statement_type: StatementType,
    /// Why the statement could not be verified, when it could not.
    pub note: Option<String>,
}

impl ClassificationResult {
    pub fn new(level: SafetyLevel, statement_type: StatementType) -> Self {
        Self {
            level,
            statement_type,
            note: None,
        }
    }

    pub fn unverified(note: impl Into<String>) -> Self {
        Self {
            level: SafetyLevel::Unverified,
            statement_type: StatementType::Unknown,
            note: Some(note.into()),
        }
    }
}

/// What the report does with catalog entries that modify data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SafetyPolicy {
    /// Run them, with a warning.
    #[default]
    WarnOnly,
    /// Skip them, and anything that could not be verified as read-only;
    /// their index row is still written.
    ReadOnly,
}

impl SafetyPolicy {
    /// Returns true if an entry with this classification must not run.
    ///
    /// An unparsable batch may hide a write next to its opaque parts, so
    /// read-only mode only runs statements classified [`SafetyLevel::Safe`].
    pub fn blocks(&self, classification: &ClassificationResult) -> bool {
        match self {
            Self::WarnOnly => false,
            Self::ReadOnly => classification.level != SafetyLevel::Safe,
        }
    }
}
