//! Per-table load: parse, dedup, batch insert

use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::download::locate_source;
use crate::error::{RegistryError, Result};
use crate::parser::{Record, RowReader};
use crate::schema::TableSchema;
use crate::ui::Ui;
use crate::writer::{join_key, Backend, RowValues};

/// Row counts for one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: String,
    pub source_file: String,
    /// Data records parsed (header excluded)
    pub rows_read: u64,
    pub inserted: u64,
    /// Skipped because the dedup key was already known
    pub duplicates: u64,
    /// Skipped because the record could not be parsed
    pub malformed: u64,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

/// Rows buffered for the next insert, with their data-row range
struct Batch {
    rows: Vec<RowValues>,
    first_row: u64,
    last_row: u64,
}

impl Batch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            first_row: 0,
            last_row: 0,
        }
    }

    fn push(&mut self, row_number: u64, values: RowValues) {
        if self.rows.is_empty() {
            self.first_row = row_number;
        }
        self.last_row = row_number;
        self.rows.push(values);
    }
}

/// Load one table from its source file in `source_dir`.
///
/// Keys already in the table, or seen earlier in the file, are skipped.
/// Each batch is committed on its own; a rejected batch aborts the table
/// with the batch's row range in the error.
pub fn load_table(
    backend: &mut dyn Backend,
    schema: &'static TableSchema,
    source_dir: &Path,
    batch_size: usize,
    ui: &mut dyn Ui,
) -> Result<TableReport> {
    let start = Instant::now();
    let batch_size = batch_size.max(1);

    let file_path =
        locate_source(source_dir, schema.source_file).ok_or_else(|| RegistryError::Source {
            table: schema.name.to_string(),
            file: source_dir.join(schema.source_file),
            source: "source file not found".into(),
        })?;

    let key_columns = schema.dedup_columns();
    let key_positions = schema.dedup_positions();
    let mut known: HashSet<String> = backend
        .existing_keys(schema.name, &key_columns)
        .map_err(|e| RegistryError::Database {
            table: schema.name.to_string(),
            source: e,
        })?;
    debug!(table = schema.name, existing = known.len(), "Loaded existing keys");

    let columns = schema.column_names();
    let reader = RowReader::open(&file_path, schema).map_err(|e| RegistryError::Source {
        table: schema.name.to_string(),
        file: file_path.clone(),
        source: e.into(),
    })?;

    let mut report = TableReport {
        table: schema.name.to_string(),
        source_file: schema.source_file.to_string(),
        ..TableReport::default()
    };
    let mut batch = Batch::with_capacity(batch_size);

    for record in reader {
        let record = record.map_err(|e| RegistryError::Source {
            table: schema.name.to_string(),
            file: file_path.clone(),
            source: e.into(),
        })?;
        report.rows_read += 1;

        let row = match record {
            Record::Row(row) => row,
            Record::Malformed(e) => {
                warn!(
                    table = schema.name,
                    file = schema.source_file,
                    error = %e,
                    "Skipping malformed row"
                );
                report.malformed += 1;
                continue;
            }
        };

        let key = join_key(key_positions.iter().map(|&idx| row.values[idx].as_deref()));
        if !known.insert(key) {
            debug!(table = schema.name, line = row.line, "Skipping duplicate key");
            report.duplicates += 1;
            continue;
        }

        batch.push(report.rows_read, row.values);
        if batch.rows.len() >= batch_size {
            flush(backend, schema, &columns, &batch)?;
            report.inserted += batch.rows.len() as u64;
            batch.rows.clear();
            ui.set_progress(report.rows_read, 0, schema.name);
        }
    }

    if !batch.rows.is_empty() {
        flush(backend, schema, &columns, &batch)?;
        report.inserted += batch.rows.len() as u64;
    }

    ui.clear_progress();
    report.elapsed = start.elapsed();
    info!(
        table = schema.name,
        read = report.rows_read,
        inserted = report.inserted,
        duplicates = report.duplicates,
        malformed = report.malformed,
        elapsed_secs = report.elapsed.as_secs_f64(),
        "Loaded table"
    );

    Ok(report)
}

fn flush(
    backend: &mut dyn Backend,
    schema: &TableSchema,
    columns: &[&str],
    batch: &Batch,
) -> Result<()> {
    backend
        .insert_batch(schema.name, columns, &batch.rows)
        .map_err(|e| RegistryError::Insert {
            table: schema.name.to_string(),
            file: schema.source_file.to_string(),
            first_row: batch.first_row,
            last_row: batch.last_row,
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, TableKey};
    use crate::ui::SilentUi;
    use crate::writer::{initialize_schema, ConnectOptions, ForeignKeyMode, SqliteBackend};
    use std::fs;
    use tempfile::TempDir;

    static PARTS: TableSchema = TableSchema {
        name: "parts",
        source_file: "PARTS.txt",
        columns: &[Column::key("code"), Column::text("name")],
        key: TableKey::Natural("code"),
        foreign_keys: &[],
        has_header: true,
    };

    fn memory_backend() -> SqliteBackend {
        let (mut backend, _) =
            SqliteBackend::open(Path::new(":memory:"), ConnectOptions::default()).unwrap();
        initialize_schema(&mut backend, &[&PARTS], ForeignKeyMode::Advisory).unwrap();
        backend
    }

    #[test]
    fn test_counts_add_up() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("PARTS.txt"),
            "CODE,NAME,\nA,one,\nB,two,\nA,again,\nC\n,blank,\nD,four,\n",
        )
        .unwrap();
        let mut backend = memory_backend();

        let report = load_table(&mut backend, &PARTS, dir.path(), 2, &mut SilentUi).unwrap();

        assert_eq!(report.rows_read, 6);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.malformed, 2);
        assert_eq!(backend.row_count("parts").unwrap(), 3);
    }

    #[test]
    fn test_existing_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("PARTS.txt"), "CODE,NAME\nA,one\nB,two\n").unwrap();
        let mut backend = memory_backend();

        load_table(&mut backend, &PARTS, dir.path(), 5000, &mut SilentUi).unwrap();
        let second = load_table(&mut backend, &PARTS, dir.path(), 5000, &mut SilentUi).unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(backend.row_count("parts").unwrap(), 2);
    }

    #[test]
    fn test_missing_source_file() {
        let dir = TempDir::new().unwrap();
        let mut backend = memory_backend();

        let err = load_table(&mut backend, &PARTS, dir.path(), 10, &mut SilentUi).unwrap_err();
        assert!(matches!(err, RegistryError::Source { .. }));
    }

    #[test]
    fn test_rejected_batch_reports_row_range() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("PARTS.txt"), "CODE,NAME\nA,one\nB,two\nC,three\n").unwrap();
        let (mut backend, _) =
            SqliteBackend::open(Path::new(":memory:"), ConnectOptions::default()).unwrap();
        // Wrong shape: inserts into "parts" fail on the unknown column
        backend
            .execute_ddl("CREATE TABLE \"parts\" (\"code\" TEXT PRIMARY KEY)")
            .unwrap();

        let err = load_table(&mut backend, &PARTS, dir.path(), 2, &mut SilentUi).unwrap_err();
        match err {
            RegistryError::Insert {
                first_row,
                last_row,
                ..
            } => assert_eq!((first_row, last_row), (1, 2)),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(backend.row_count("parts").unwrap(), 0);
    }
}
