//! End-to-end registry load
//!
//! [`run`] is the strict sequence connect, initialize schema, check the
//! table selection, fetch, truncate, load. The first failure ends the run;
//! tables loaded before it stay loaded.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::RegistryConfig;
use crate::download::{fetch_archive, FetchOptions};
use crate::error::{RegistryError, Result};
use crate::loader::{load_table, TableReport};
use crate::schema::{DependencyResolver, TableSchema};
use crate::ui::{Phase, Ui};
use crate::writer::{
    connect, initialize_schema, Backend, ConnectOptions, ConnectionParams, ForeignKeyMode,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub connect: ConnectOptions,
    pub fetch: FetchOptions,
    /// Leave existing rows in place instead of clearing the tables first
    pub keep_existing: bool,
    pub fk_mode: ForeignKeyMode,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub target: String,
    pub database_existed: bool,
    /// `None` when a local copy of the archive was reused
    pub downloaded_bytes: Option<u64>,
    /// Rows removed before loading, zero with `keep_existing`
    pub truncated_rows: u64,
    pub tables: Vec<TableReport>,
    #[serde(serialize_with = "secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn total_inserted(&self) -> u64 {
        self.tables.iter().map(|t| t.inserted).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.tables.iter().map(|t| t.duplicates + t.malformed).sum()
    }
}

fn secs<S: serde::Serializer>(
    value: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Row count of one table, `None` if the table does not exist yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStatus {
    pub table: String,
    pub rows: Option<u64>,
}

/// Run the whole load against the database described by `connection`
pub fn run(
    config: &RegistryConfig,
    connection: &ConnectionParams,
    options: &PipelineOptions,
    ui: &mut dyn Ui,
) -> Result<RunSummary> {
    ui.set_phase(Phase::Connecting);
    let mut conn = connect(connection, options.connect)?;
    info!(
        database = %conn.backend.describe(),
        existed = conn.existed,
        "Connected"
    );

    run_with_backend(config, conn.backend.as_mut(), conn.existed, options, ui)
}

/// Run every step after connecting, on an already open backend
pub fn run_with_backend(
    config: &RegistryConfig,
    backend: &mut dyn Backend,
    database_existed: bool,
    options: &PipelineOptions,
    ui: &mut dyn Ui,
) -> Result<RunSummary> {
    let start = Instant::now();
    let tables = load_order(&config.tables)?;

    ui.set_phase(Phase::InitializingSchema);
    initialize_schema(backend, &tables, options.fk_mode)?;
    if !options.keep_existing {
        check_unselected_dependents(backend, &config.catalog, &tables)?;
    }

    let fetched = fetch_archive(config, &options.fetch, ui)?;

    let truncated_rows = if options.keep_existing {
        info!("Keeping existing rows");
        0
    } else {
        ui.set_phase(Phase::Truncating);
        truncate_tables(backend, &tables)?
    };

    ui.set_phase(Phase::Loading);
    let mut reports = Vec::with_capacity(tables.len());
    for schema in &tables {
        let report = load_table(backend, *schema, &fetched.source_dir, config.batch_size, ui)?;
        reports.push(report);
    }

    ui.set_phase(Phase::Complete);
    let summary = RunSummary {
        target: backend.describe(),
        database_existed,
        downloaded_bytes: fetched.downloaded_bytes,
        truncated_rows,
        tables: reports,
        elapsed: start.elapsed(),
    };
    info!(
        inserted = summary.total_inserted(),
        skipped = summary.total_skipped(),
        elapsed_secs = summary.elapsed.as_secs_f64(),
        "Load complete"
    );

    Ok(summary)
}

/// Tables in dependency order, parents first
pub fn load_order(tables: &[&'static TableSchema]) -> Result<Vec<&'static TableSchema>> {
    DependencyResolver::new(tables)
        .all_tables_ordered()
        .map_err(|message| RegistryError::Schema {
            table: tables
                .iter()
                .map(|t| t.name)
                .collect::<Vec<_>>()
                .join(", "),
            message,
            source: None,
        })
}

/// Clearing a selected parent must not orphan rows of an unselected child
fn check_unselected_dependents(
    backend: &mut dyn Backend,
    catalog: &[&'static TableSchema],
    selected: &[&'static TableSchema],
) -> Result<()> {
    let mut known = catalog.to_vec();
    for &table in selected {
        if !known.iter().any(|t| t.name == table.name) {
            known.push(table);
        }
    }

    let selected_names: Vec<&str> = selected.iter().map(|t| t.name).collect();
    let unaffected = DependencyResolver::new(&known)
        .resolve_excludes(&selected_names)
        .map_err(|message| RegistryError::Schema {
            table: selected_names.join(", "),
            message,
            source: None,
        })?;

    let dependents = known.iter().filter(|t| {
        !selected_names.contains(&t.name) && !unaffected.iter().any(|u| u.name == t.name)
    });
    for dependent in dependents {
        let database_error = |source| RegistryError::Database {
            table: dependent.name.to_string(),
            source,
        };
        if backend
            .table_columns(dependent.name)
            .map_err(database_error)?
            .is_empty()
        {
            continue;
        }
        if backend.row_count(dependent.name).map_err(database_error)? == 0 {
            continue;
        }

        let mut parents: Vec<&str> = dependent
            .dependencies()
            .into_iter()
            .filter(|parent| selected_names.contains(parent))
            .collect();
        parents.sort_unstable();
        return Err(RegistryError::Selection {
            table: parents.join(", "),
            message: format!(
                "{} still holds rows referencing it; load {} too or keep existing rows",
                dependent.name, dependent.name
            ),
        });
    }
    Ok(())
}

/// Clear tables children first, so enforced foreign keys never block a delete
fn truncate_tables(backend: &mut dyn Backend, ordered: &[&'static TableSchema]) -> Result<u64> {
    let mut removed = 0;
    for schema in ordered.iter().rev() {
        let rows = backend
            .truncate(schema.name)
            .map_err(|e| RegistryError::Database {
                table: schema.name.to_string(),
                source: e,
            })?;
        if rows > 0 {
            info!(table = schema.name, rows, "Cleared table");
        }
        removed += rows;
    }
    Ok(removed)
}

/// Row counts for the configured tables, without creating anything
pub fn status(
    config: &RegistryConfig,
    connection: &ConnectionParams,
    options: ConnectOptions,
) -> Result<Vec<TableStatus>> {
    let options = ConnectOptions {
        create_if_missing: false,
        ..options
    };
    let mut conn = connect(connection, options)?;
    table_status(conn.backend.as_mut(), &config.tables)
}

pub fn table_status(
    backend: &mut dyn Backend,
    tables: &[&'static TableSchema],
) -> Result<Vec<TableStatus>> {
    let database_error = |table: &str, source| RegistryError::Database {
        table: table.to_string(),
        source,
    };

    let mut statuses = Vec::with_capacity(tables.len());
    for schema in tables {
        let columns = backend
            .table_columns(schema.name)
            .map_err(|e| database_error(schema.name, e))?;
        let rows = if columns.is_empty() {
            warn!(table = schema.name, "Table does not exist");
            None
        } else {
            Some(
                backend
                    .row_count(schema.name)
                    .map_err(|e| database_error(schema.name, e))?,
            )
        };
        statuses.push(TableStatus {
            table: schema.name.to_string(),
            rows,
        });
    }
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ForeignKey, TableKey};
    use crate::ui::SilentUi;
    use crate::writer::SqliteBackend;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    static MAKES: TableSchema = TableSchema {
        name: "makes",
        source_file: "MAKES.txt",
        columns: &[Column::key("code"), Column::text("name")],
        key: TableKey::Natural("code"),
        foreign_keys: &[],
        has_header: true,
    };

    static PLANES: TableSchema = TableSchema {
        name: "planes",
        source_file: "PLANES.txt",
        columns: &[Column::key("tail"), Column::lookup("make")],
        key: TableKey::Natural("tail"),
        foreign_keys: &[ForeignKey::hard("make", "makes", "code")],
        has_header: true,
    };

    fn config_in(dir: &Path) -> RegistryConfig {
        let config = RegistryConfig::default_in(dir).with_tables(vec![&PLANES, &MAKES]);
        fs::create_dir_all(&config.extract_dir).unwrap();
        fs::write(config.extract_dir.join("MAKES.txt"), "CODE,NAME\nM1,Cessna\nM2,Piper\n")
            .unwrap();
        fs::write(config.extract_dir.join("PLANES.txt"), "TAIL,MAKE\nN1,M1\nN2,M2\n").unwrap();
        config
    }

    fn reuse_options() -> PipelineOptions {
        PipelineOptions {
            fetch: FetchOptions {
                reuse_local: true,
                ..FetchOptions::default()
            },
            fk_mode: ForeignKeyMode::Enforced,
            ..PipelineOptions::default()
        }
    }

    fn memory_backend() -> SqliteBackend {
        SqliteBackend::open(Path::new(":memory:"), ConnectOptions::default())
            .unwrap()
            .0
    }

    #[test]
    fn test_parents_load_before_children() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let mut backend = memory_backend();

        let summary =
            run_with_backend(&config, &mut backend, false, &reuse_options(), &mut SilentUi)
                .unwrap();

        let order: Vec<&str> = summary.tables.iter().map(|t| t.table.as_str()).collect();
        assert_eq!(order, vec!["makes", "planes"]);
        assert_eq!(summary.total_inserted(), 4);
        assert_eq!(summary.downloaded_bytes, None);
    }

    #[test]
    fn test_rerun_truncates_unless_keeping_rows() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let mut backend = memory_backend();
        let options = reuse_options();

        run_with_backend(&config, &mut backend, false, &options, &mut SilentUi).unwrap();
        let second =
            run_with_backend(&config, &mut backend, true, &options, &mut SilentUi).unwrap();
        assert_eq!(second.truncated_rows, 4);
        assert_eq!(second.total_inserted(), 4);

        let keep = PipelineOptions {
            keep_existing: true,
            ..options
        };
        let third = run_with_backend(&config, &mut backend, true, &keep, &mut SilentUi).unwrap();
        assert_eq!(third.truncated_rows, 0);
        assert_eq!(third.total_inserted(), 0);
        assert_eq!(third.total_skipped(), 4);
    }

    #[test]
    fn test_reloading_a_parent_alone_is_refused() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let mut backend = memory_backend();
        let options = reuse_options();
        run_with_backend(&config, &mut backend, false, &options, &mut SilentUi).unwrap();

        let parent_only = config.clone().with_tables(vec![&MAKES]);
        let err = run_with_backend(&parent_only, &mut backend, true, &options, &mut SilentUi)
            .unwrap_err();
        match err {
            RegistryError::Selection { ref table, ref message } => {
                assert_eq!(table, "makes");
                assert!(message.contains("planes"));
            }
            ref other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.component(), "orchestrator");
        assert_eq!(backend.row_count("makes").unwrap(), 2);

        let keep = PipelineOptions {
            keep_existing: true,
            ..options
        };
        let summary =
            run_with_backend(&parent_only, &mut backend, true, &keep, &mut SilentUi).unwrap();
        assert_eq!(summary.total_skipped(), 2);
    }

    #[test]
    fn test_reloading_a_child_alone_is_allowed() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let mut backend = memory_backend();
        let options = reuse_options();
        run_with_backend(&config, &mut backend, false, &options, &mut SilentUi).unwrap();

        let child_only = config.clone().with_tables(vec![&PLANES]);
        let summary =
            run_with_backend(&child_only, &mut backend, true, &options, &mut SilentUi).unwrap();
        assert_eq!(summary.truncated_rows, 2);
        assert_eq!(summary.total_inserted(), 2);
        assert_eq!(backend.row_count("makes").unwrap(), 2);
    }

    #[test]
    fn test_table_status_reports_missing_tables() {
        let mut backend = memory_backend();
        initialize_schema(&mut backend, &[&MAKES], ForeignKeyMode::Advisory).unwrap();

        let statuses = table_status(&mut backend, &[&MAKES, &PLANES]).unwrap();
        assert_eq!(
            statuses,
            vec![
                TableStatus {
                    table: "makes".into(),
                    rows: Some(0)
                },
                TableStatus {
                    table: "planes".into(),
                    rows: None
                },
            ]
        );
    }
}
