//! Configuration management for sql-diagnostics.
//!
//! Handles loading the database connection from a Java-style properties file
//! and carries the per-run settings handed to the report runner.

use crate::db::DatabaseBackend;
use crate::error::{DiagnosticsError, Result};
use crate::report::{FailurePolicy, RepeatSchedule};
use crate::safety::SafetyPolicy;
use crate::sink::SinkKind;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default path of the connection properties file.
pub const DEFAULT_CONFIG_PATH: &str = "config.properties";

/// Default path of the query catalog.
pub const DEFAULT_CATALOG_PATH: &str = "sql_queries.json";

/// Property holding a complete connection string; overrides all other keys.
pub const CONNECTION_STRING_KEY: &str = "DB_CONNECTION_STRING";

const HOST_KEY: &str = "DB_HOST";
const PORT_KEY: &str = "DB_PORT";
const DATABASE_KEY: &str = "DB_NAME";
const USER_KEY: &str = "USER";
const PASSWORD_KEY: &str = "PASSWORD";
const TRUSTED_KEY: &str = "TRUSTED";

/// Database connection configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: Option<String>,

    /// Database port.
    pub port: u16,

    /// Database name.
    pub database: Option<String>,

    /// Database user.
    pub user: Option<String>,

    /// Database password.
    pub password: Option<String>,

    /// Use integrated security instead of user/password.
    pub trusted: bool,

    /// Pre-formed connection string; when set, the fields above are ignored.
    pub connection_string: Option<String>,
}

fn default_port() -> u16 {
    DatabaseBackend::SqlServer.default_port()
}

impl ConnectionConfig {
    /// Wraps a complete connection string.
    pub fn from_connection_string(conn_str: impl Into<String>) -> Self {
        Self {
            port: default_port(),
            connection_string: Some(conn_str.into()),
            ..Default::default()
        }
    }

    /// Loads the connection from a properties file.
    ///
    /// Lines are `key=value`, `key: value` or `key value`. Values are taken
    /// as written: `$` and `#` are literal, and `\\` stands for a backslash.
    ///
    /// A missing file is [`DiagnosticsError::ConfigMissing`]; an unreadable
    /// file, a malformed line, or a missing required key is
    /// [`DiagnosticsError::ConfigMalformed`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DiagnosticsError::config_missing(format!(
                "Please validate that {} exists for the database configuration",
                path.display()
            )));
        }

        let file = File::open(path).map_err(|e| {
            DiagnosticsError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let properties = java_properties::read(BufReader::new(file)).map_err(|e| {
            DiagnosticsError::config(format!("Configuration error in {}: {e}", path.display()))
        })?;

        Self::from_properties(&properties).map_err(|e| match e {
            DiagnosticsError::ConfigMalformed(msg) => {
                DiagnosticsError::config(format!("{msg} in {}", path.display()))
            }
            other => other,
        })
    }

    /// Builds the connection from already-parsed properties.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        if let Some(conn_str) = non_blank(properties, CONNECTION_STRING_KEY) {
            return Ok(Self::from_connection_string(conn_str));
        }

        let require = |key: &str| {
            non_blank(properties, key)
                .map(String::from)
                .ok_or_else(|| DiagnosticsError::config(format!("missing key {key}")))
        };

        let host = require(HOST_KEY)?;
        let port_str = require(PORT_KEY)?;
        let port = port_str.trim().parse::<u16>().map_err(|_| {
            DiagnosticsError::config(format!("invalid {PORT_KEY} '{port_str}'"))
        })?;
        let database = require(DATABASE_KEY)?;
        let trusted = properties
            .get(TRUSTED_KEY)
            .map(String::as_str)
            .map(parse_trusted)
            .unwrap_or(false);

        let (user, password) = if trusted {
            (
                non_blank(properties, USER_KEY).map(String::from),
                properties.get(PASSWORD_KEY).cloned(),
            )
        } else {
            let password = properties
                .get(PASSWORD_KEY)
                .cloned()
                .ok_or_else(|| DiagnosticsError::config(format!("missing key {PASSWORD_KEY}")))?;
            (Some(require(USER_KEY)?), Some(password))
        };

        Ok(Self {
            host: Some(host),
            port,
            database: Some(database),
            user,
            password,
            trusted,
            connection_string: None,
        })
    }

    /// Returns the backend this configuration targets.
    pub fn backend(&self) -> DatabaseBackend {
        match &self.connection_string {
            Some(conn_str) if conn_str.trim_start().starts_with("sqlite:") => {
                DatabaseBackend::Sqlite
            }
            _ => DatabaseBackend::SqlServer,
        }
    }

    /// Converts the connection config to a connection string.
    ///
    /// Built configurations produce an ADO-style SQL Server string with
    /// encryption off and the server certificate trusted.
    pub fn to_connection_string(&self) -> Result<String> {
        if let Some(conn_str) = &self.connection_string {
            return Ok(conn_str.clone());
        }

        let host = self
            .host
            .as_deref()
            .ok_or_else(|| DiagnosticsError::config("Database host is required"))?;
        let database = self
            .database
            .as_deref()
            .ok_or_else(|| DiagnosticsError::config("Database name is required"))?;

        let mut conn_str = format!(
            "server=tcp:{},{};database={};",
            ado_value(host),
            self.port,
            ado_value(database)
        );

        if self.trusted {
            conn_str.push_str("IntegratedSecurity=true;");
        } else {
            let user = self
                .user
                .as_deref()
                .ok_or_else(|| DiagnosticsError::config("Database user is required"))?;
            conn_str.push_str(&format!("user={};", ado_value(user)));
            conn_str.push_str(&format!(
                "password={};",
                ado_value(self.password.as_deref().unwrap_or_default())
            ));
        }

        conn_str.push_str("TrustServerCertificate=true;encrypt=false");
        Ok(conn_str)
    }

    /// Returns a display-safe string (no password) for logs and prompts.
    pub fn display_string(&self) -> String {
        if let Some(conn_str) = &self.connection_string {
            return redact_connection_string(conn_str);
        }
        let host = self.host.as_deref().unwrap_or("localhost");
        let database = self.database.as_deref().unwrap_or("unknown");
        format!("{database} @ {host}:{}", self.port)
    }
}

/// Per-run settings handed to the report runner.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Connection properties file.
    pub config_path: PathBuf,

    /// Query catalog file.
    pub catalog_path: PathBuf,

    /// Directory the workbook is written to.
    pub output_dir: PathBuf,

    /// How results are staged before the workbook is written.
    pub sink: SinkKind,

    /// What a failing catalog entry does to the run.
    pub failure_policy: FailurePolicy,

    /// What happens to entries that modify data.
    pub safety_policy: SafetyPolicy,

    /// How often the whole report is produced.
    pub schedule: RepeatSchedule,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            output_dir: PathBuf::from("."),
            sink: SinkKind::default(),
            failure_policy: FailurePolicy::default(),
            safety_policy: SafetyPolicy::default(),
            schedule: RepeatSchedule::once(),
        }
    }
}

fn non_blank<'a>(properties: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    properties
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// Parses the TRUSTED flag; unrecognized values mean `false`.
fn parse_trusted(raw: &str) -> bool {
    match raw.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => true,
        "false" | "f" | "0" | "no" => false,
        _ => {
            warn!("Invalid {TRUSTED_KEY} property '{raw}', defaulting to false");
            false
        }
    }
}

/// Quotes an ADO connection string value when it contains separators or quotes.
fn ado_value(value: &str) -> String {
    let needs_quoting = value.contains([';', '\'', '"'])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);

    if needs_quoting {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Masks `password=` / `pwd=` segments of a connection string.
fn redact_connection_string(conn_str: &str) -> String {
    conn_str
        .split(';')
        .map(|segment| match segment.split_once('=') {
            Some((key, _)) if matches!(key.trim().to_lowercase().as_str(), "password" | "pwd") => {
                format!("{key}=****")
            }
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}
