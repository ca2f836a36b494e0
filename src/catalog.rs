//! Query catalog loading.
//!
//! A catalog is a JSON document holding source metadata and an ordered list
//! of named diagnostic queries:
//!
//! ```json
//! {
//!   "querysource": { "sqlserverversion": "16", "author": "..." },
//!   "queries": [
//!     { "name": "CheckVersion", "description": "...", "query": "SELECT ...", "notes": "..." }
//!   ]
//! }
//! ```
//!
//! Entry order is meaningful: an entry's identity within a run is its 1-based
//! position, not its name.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::{DiagnosticsError, Result};

/// Descriptive metadata about where a catalog came from. Never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QuerySourceMetadata {
    #[serde(rename = "sqlserverversion", deserialize_with = "null_as_empty")]
    pub sql_server_version: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub author: String,
    #[serde(rename = "lastmodified", deserialize_with = "null_as_empty")]
    pub last_modified: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub source: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub comments: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub copyright: String,
}

/// One named diagnostic query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryDefinition {
    /// Display name, used to derive the worksheet name. Need not be unique.
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,

    #[serde(deserialize_with = "null_as_empty")]
    pub description: String,

    /// The SQL text that is executed.
    #[serde(rename = "query", deserialize_with = "null_as_empty")]
    pub statement: String,

    #[serde(deserialize_with = "null_as_empty")]
    pub notes: String,
}

impl QueryDefinition {
    /// Creates a definition with the given name and statement.
    pub fn new(name: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            statement: statement.into(),
            ..Default::default()
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Ordered, immutable list of queries plus source metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryCatalog {
    #[serde(rename = "querysource")]
    source: QuerySourceMetadata,

    queries: Vec<QueryDefinition>,
}

impl QueryCatalog {
    /// Builds a catalog from already-parsed parts.
    pub fn new(source: QuerySourceMetadata, queries: Vec<QueryDefinition>) -> Self {
        Self { source, queries }
    }

    /// Loads a catalog from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            DiagnosticsError::catalog_read(format!(
                "Failed to open query catalog {}: {e}",
                path.display()
            ))
        })?;

        Self::from_reader(file).map_err(|e| match e {
            DiagnosticsError::CatalogParse(msg) => {
                DiagnosticsError::catalog_parse(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Reads and parses a catalog from any byte stream.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| DiagnosticsError::catalog_read(format!("Failed to read query catalog: {e}")))?;

        Self::from_json(&content)
    }

    /// Parses a catalog from a JSON string.
    ///
    /// Missing fields become empty strings; `name`/`statement` emptiness is
    /// not validated here.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| DiagnosticsError::catalog_parse(format!("Invalid query catalog: {e}")))
    }

    pub fn source(&self) -> &QuerySourceMetadata {
        &self.source
    }

    pub fn queries(&self) -> &[QueryDefinition] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Iterates entries with their 1-based positions.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &QueryDefinition)> {
        self.queries.iter().enumerate().map(|(i, q)| (i + 1, q))
    }
}

/// Treats an explicit JSON `null` the same as a missing string field.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
