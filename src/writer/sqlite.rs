use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{insert_sql, join_key, Backend, ConnectOptions, Dialect, RowValues};
use crate::error::{BoxError, RegistryError, Result};

const MEMORY_PATH: &str = ":memory:";

/// Embedded SQLite database
pub struct SqliteBackend {
    conn: Connection,
    path: PathBuf,
}

impl SqliteBackend {
    /// Open (and by default create) the database file at `path`.
    /// Returns the backend and whether the file already existed.
    pub fn open(path: &Path, options: ConnectOptions) -> Result<(Self, bool)> {
        let path_error = |message: String, source: Option<BoxError>| RegistryError::Path {
            path: path.to_path_buf(),
            message,
            source,
        };

        if path.as_os_str() == MEMORY_PATH {
            let conn = Connection::open_in_memory()
                .map_err(|e| path_error("failed to open in-memory database".into(), Some(e.into())))?;
            let backend = Self::configure(conn, path)?;
            return Ok((backend, false));
        }

        if path.is_dir() {
            return Err(path_error("path is a directory".into(), None));
        }

        let existed = path.exists();
        if !existed && !options.create_if_missing {
            return Err(RegistryError::Connection {
                target: path.display().to_string(),
                message: "database does not exist and creation is disabled".into(),
                source: None,
            });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                path_error(format!("cannot create directory {:?}", parent), Some(e.into()))
            })?;
        }

        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if options.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| path_error("failed to open database".into(), Some(e.into())))?;
        conn.busy_timeout(options.timeout)
            .map_err(|e| path_error("failed to set busy timeout".into(), Some(e.into())))?;

        debug!(path = %path.display(), existed, "Opened SQLite database");
        Ok((Self::configure(conn, path)?, existed))
    }

    fn configure(conn: Connection, path: &Path) -> Result<Self> {
        // Optimize for bulk insert
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;",
        )
        .map_err(|e| RegistryError::Path {
            path: path.to_path_buf(),
            message: "database rejected connection settings".into(),
            source: Some(e.into()),
        })?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }
}

impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn execute_ddl(&mut self, sql: &str) -> std::result::Result<(), BoxError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn table_columns(&mut self, table: &str) -> std::result::Result<Vec<String>, BoxError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn foreign_keys(
        &mut self,
        table: &str,
    ) -> std::result::Result<Vec<(String, String)>, BoxError> {
        let mut stmt = self
            .conn
            .prepare("SELECT \"from\", \"table\" FROM pragma_foreign_key_list(?1)")?;
        let keys = stmt
            .query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn enable_foreign_keys(&mut self) -> std::result::Result<(), BoxError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
    }

    fn truncate(&mut self, table: &str) -> std::result::Result<u64, BoxError> {
        let sql = format!("DELETE FROM {}", Dialect::Sqlite.quote_ident(table));
        let deleted = self.conn.execute(&sql, [])?;
        Ok(deleted as u64)
    }

    fn existing_keys(
        &mut self,
        table: &str,
        key_columns: &[&str],
    ) -> std::result::Result<HashSet<String>, BoxError> {
        let dialect = Dialect::Sqlite;
        let columns: Vec<String> = key_columns.iter().map(|c| dialect.quote_ident(c)).collect();
        let sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            dialect.quote_ident(table)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let width = key_columns.len();
        let mut rows = stmt.query([])?;
        let mut keys = HashSet::new();

        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|idx| row.get::<_, Option<String>>(idx))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            keys.insert(join_key(values.iter().map(|v| v.as_deref())));
        }

        Ok(keys)
    }

    fn insert_batch(
        &mut self,
        table: &str,
        columns: &[&str],
        rows: &[RowValues],
    ) -> std::result::Result<(), BoxError> {
        let sql = insert_sql(Dialect::Sqlite, table, columns);
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn row_count(&mut self, table: &str) -> std::result::Result<u64, BoxError> {
        let sql = format!("SELECT COUNT(*) FROM {}", Dialect::Sqlite.quote_ident(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
