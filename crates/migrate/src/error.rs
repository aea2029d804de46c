//! Error types for chain assembly, planning and execution
//!
//! Structural errors are raised before the database is touched, connectivity
//! errors mean the marker can no longer be trusted, execution errors halt the
//! remaining plan. `Drift` is kept apart because it needs an operator.

use std::path::PathBuf;
use thiserror::Error;

use crate::unit::Direction;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Result type alias for database calls
pub type DbResult<T> = Result<T, DatabaseError>;

/// Errors raised by a `DatabaseConnection`
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("Malformed response: {0}")]
    Response(String),

    #[error("Query failed: {0}")]
    Query(String),
}

impl From<url::ParseError> for DatabaseError {
    fn from(err: url::ParseError) -> Self {
        DatabaseError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Response(err.to_string())
    }
}

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed migration metadata in {}: {source}", path.display())]
    MalformedMetadata {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize migration metadata: {0}")]
    MetadataWrite(#[from] toml::ser::Error),

    #[error("'{target}' is not a valid {direction} target")]
    InvalidTarget { direction: Direction, target: String },

    #[error("Migration chain broken: next_version {missing} not found")]
    BrokenChain { missing: String },

    #[error("Target version {0} not found in migration chain")]
    TargetNotFound(String),

    #[error("Current version {0} not found in migration chain")]
    CurrentNotFound(String),

    #[error("Cannot reach target version {target} from current version {current}")]
    Unreachable { target: String, current: String },

    #[error("Migration directory not found for version {0}")]
    DirectoryNotFound(String),

    #[error("No {direction} SQL file found for version {version}: {}", path.display())]
    ScriptMissing {
        version: String,
        direction: Direction,
        path: PathBuf,
    },

    #[error("Failed to read {} for version {version}: {source}", path.display())]
    ScriptUnreadable {
        version: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Empty {direction} SQL file for version {version}: {}", path.display())]
    ScriptEmpty {
        version: String,
        direction: Direction,
        path: PathBuf,
    },

    #[error("No valid SQL statements in {direction} file for version {version}: {}", path.display())]
    NoStatements {
        version: String,
        direction: Direction,
        path: PathBuf,
    },

    #[error("SQL execution failed for version {version} at statement {index}/{total}: {source}")]
    Statement {
        version: String,
        index: usize,
        total: usize,
        statement: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Failed to create migration table: {0}")]
    SchemaEnsure(#[source] DatabaseError),

    #[error("Failed to get current migration version: {0}")]
    MarkerRead(#[source] DatabaseError),

    #[error("Failed to update migration table to '{marker}': {source}")]
    MarkerWrite {
        marker: String,
        #[source]
        source: DatabaseError,
    },

    #[error(
        "Schema drift: {direction} of {version} took effect but the marker could not be set to '{marker}': {source}"
    )]
    Drift {
        version: String,
        direction: Direction,
        marker: String,
        #[source]
        source: DatabaseError,
    },
}

impl MigrationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Schema changes applied while the recorded version went stale
    pub fn is_drift(&self) -> bool {
        matches!(self, MigrationError::Drift { .. })
    }

    /// Raised before any statement reached the database
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MigrationError::MalformedMetadata { .. }
                | MigrationError::BrokenChain { .. }
                | MigrationError::InvalidTarget { .. }
                | MigrationError::TargetNotFound(_)
                | MigrationError::CurrentNotFound(_)
                | MigrationError::Unreachable { .. }
        )
    }
}
