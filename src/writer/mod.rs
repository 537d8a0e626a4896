//! Database backends
//!
//! [`Backend`] is the capability interface the loader and schema initializer
//! talk to. [`connect`] picks the implementation once, from the engine kind,
//! and hands back a boxed handle that is threaded through the pipeline.

pub mod dialect;
pub mod postgres;
pub mod schema_gen;
pub mod sqlite;

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BoxError, Result};

pub use self::postgres::{PostgresBackend, ServerAuth, ServerParams};
pub use dialect::Dialect;
pub use schema_gen::{generate_create_table, generate_indexes, initialize_schema, ForeignKeyMode};
pub use sqlite::SqliteBackend;

/// One parsed row: one value per data column, `None` for empty fields
pub type RowValues = Vec<Option<String>>;

/// Separator used when joining multi-column dedup keys
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Join column values into a dedup key
pub fn join_key<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> String {
    let mut key = String::new();
    for (idx, value) in values.into_iter().enumerate() {
        if idx > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(value.unwrap_or(""));
    }
    key
}

/// Operations the pipeline needs from a database
pub trait Backend {
    fn dialect(&self) -> Dialect;

    /// Human readable target, for logs and errors
    fn describe(&self) -> String;

    /// Execute one or more DDL statements
    fn execute_ddl(&mut self, sql: &str) -> std::result::Result<(), BoxError>;

    /// Column names of an existing table, empty if the table is absent
    fn table_columns(&mut self, table: &str) -> std::result::Result<Vec<String>, BoxError>;

    /// Declared FOREIGN KEY constraints of a table as
    /// `(column, referenced table)` pairs
    fn foreign_keys(
        &mut self,
        table: &str,
    ) -> std::result::Result<Vec<(String, String)>, BoxError>;

    /// Turn foreign key enforcement on for this session, where the backend
    /// needs it
    fn enable_foreign_keys(&mut self) -> std::result::Result<(), BoxError>;

    /// Remove every row of a table
    fn truncate(&mut self, table: &str) -> std::result::Result<u64, BoxError>;

    /// Dedup keys already present in a table, joined with [`join_key`]
    fn existing_keys(
        &mut self,
        table: &str,
        key_columns: &[&str],
    ) -> std::result::Result<HashSet<String>, BoxError>;

    /// Insert all rows in one transaction with one prepared statement.
    /// Either every row is committed or none is.
    fn insert_batch(
        &mut self,
        table: &str,
        columns: &[&str],
        rows: &[RowValues],
    ) -> std::result::Result<(), BoxError>;

    fn row_count(&mut self, table: &str) -> std::result::Result<u64, BoxError>;
}

/// Build the parameterized INSERT statement for a table
pub fn insert_sql(dialect: Dialect, table: &str, columns: &[&str]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| dialect.quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| dialect.placeholder(i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote_ident(table),
        quoted.join(", "),
        placeholders.join(", ")
    )
}

/// Where and how to connect
#[derive(Debug, Clone)]
pub enum ConnectionParams {
    Embedded { path: PathBuf },
    Server(ServerParams),
}

/// Connection behaviour shared by both backends
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// Create the database when it does not exist yet
    pub create_if_missing: bool,
    /// Connect timeout, and the SQLite busy timeout
    pub timeout: Duration,
    /// Server-side limit per statement, unlimited when `None`
    pub statement_timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            timeout: Duration::from_secs(30),
            statement_timeout: None,
        }
    }
}

/// An open database handle
pub struct Connection {
    pub backend: Box<dyn Backend>,
    /// Whether the database file or instance was already there
    pub existed: bool,
}

/// Open the database described by `params`
pub fn connect(params: &ConnectionParams, options: ConnectOptions) -> Result<Connection> {
    match params {
        ConnectionParams::Embedded { path } => {
            let (backend, existed) = SqliteBackend::open(path, options)?;
            Ok(Connection {
                backend: Box::new(backend),
                existed,
            })
        }
        ConnectionParams::Server(server) => {
            let (backend, existed) = PostgresBackend::open(server, options)?;
            Ok(Connection {
                backend: Box::new(backend),
                existed,
            })
        }
    }
}
