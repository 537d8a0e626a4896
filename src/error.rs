//! Error types for the registry load pipeline
//!
//! Every fatal variant carries enough context (table, file, batch range) to
//! diagnose the failure and re-run. Row-level problems are [`ParseError`]s,
//! which the loader recovers from.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed backend or transport error
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// Network failure or non-success HTTP status while fetching the archive
    #[error("Download of {url} failed: {message}")]
    Download {
        url: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Corrupt, incomplete, or missing archive contents
    #[error("Extraction from {path:?} failed: {message}")]
    Extract {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Database server unreachable or credentials rejected
    #[error("Connection to {target} failed: {message}")]
    Connection {
        target: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Local database path invalid or unwritable
    #[error("Invalid database path {path:?}: {message}")]
    Path {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// DDL rejected or existing schema incompatible
    #[error("Schema error on table {table}: {message}")]
    Schema {
        table: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A batch insert was rejected; the whole batch was rolled back
    #[error("Insert into {table} from {file} failed for rows {first_row}-{last_row}: {source}")]
    Insert {
        table: String,
        file: String,
        first_row: u64,
        last_row: u64,
        #[source]
        source: BoxError,
    },

    /// Reading an extracted source file failed outright
    #[error("Failed to read {file:?} for table {table}: {source}")]
    Source {
        table: String,
        file: PathBuf,
        #[source]
        source: BoxError,
    },

    /// The table selection would clear rows that an unselected table references
    #[error("Cannot reload table {table}: {message}")]
    Selection { table: String, message: String },

    /// Database operation outside schema setup and batch inserts
    #[error("Database error on table {table}: {source}")]
    Database {
        table: String,
        #[source]
        source: BoxError,
    },
}

impl RegistryError {
    /// Pipeline component the error belongs to, for the final report
    pub fn component(&self) -> &'static str {
        match self {
            RegistryError::Download { .. } => "fetcher (download)",
            RegistryError::Extract { .. } => "fetcher (extract)",
            RegistryError::Connection { .. } | RegistryError::Path { .. } => "connection provider",
            RegistryError::Schema { .. } => "schema initializer",
            RegistryError::Selection { .. } => "orchestrator",
            RegistryError::Insert { .. }
            | RegistryError::Source { .. }
            | RegistryError::Database { .. } => "loader",
        }
    }
}

/// A malformed source row. Recovered locally: the row is skipped and counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: required column {column} is empty")]
    MissingValue { line: u64, column: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_error_names_table_file_and_range() {
        let err = RegistryError::Insert {
            table: "master".into(),
            file: "MASTER.txt".into(),
            first_row: 5001,
            last_row: 10000,
            source: "constraint failed".into(),
        };
        let message = err.to_string();
        assert!(message.contains("master"));
        assert!(message.contains("MASTER.txt"));
        assert!(message.contains("5001-10000"));
        assert_eq!(err.component(), "loader");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::ColumnCount {
            line: 7,
            expected: 13,
            found: 4,
        };
        assert_eq!(err.to_string(), "line 7: expected 13 columns, found 4");
    }
}
