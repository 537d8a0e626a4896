use anyhow::{Context, Result};
use faa_registry_loader::{
    cli::{Cli, Commands, SourceArgs},
    config::RegistryConfig,
    download::{fetch_archive, FetchOptions},
    error::RegistryError,
    filter::resolve_tables,
    logging::{init_logging, level_for},
    pipeline::{self, load_order, PipelineOptions, RunSummary, TableStatus},
    schema::{TableKey, ALL_TABLES},
    ui::{ConsoleUi, SilentUi, Ui},
    writer::{ConnectOptions, ForeignKeyMode},
};
use std::time::Duration;
use tracing::error;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(level_for(cli.verbose, cli.quiet), cli.log_format)?;

    match cli.command {
        Commands::Load {
            db,
            source,
            batch_size,
            skip_download,
            no_create_db,
            keep_existing,
            enforce_foreign_keys,
            include,
            exclude,
            json,
        } => {
            let connection = db.connection_params()?;
            let tables = resolve_tables(ALL_TABLES, include, exclude)?;
            let batch_size = usize::try_from(batch_size).context("--batch-size is too large")?;
            let config = registry_config(&source)?
                .with_tables(tables)
                .with_batch_size(batch_size);

            let options = PipelineOptions {
                connect: ConnectOptions {
                    create_if_missing: !no_create_db,
                    timeout: db.timeout(),
                    statement_timeout: db.statement_timeout(),
                },
                fetch: FetchOptions {
                    reuse_local: skip_download,
                    connect_timeout: db.timeout(),
                    download_timeout: Duration::from_secs(source.download_timeout),
                },
                keep_existing,
                fk_mode: if enforce_foreign_keys {
                    ForeignKeyMode::Enforced
                } else {
                    ForeignKeyMode::Advisory
                },
            };

            let mut ui = make_ui(cli.quiet || json);
            let summary =
                pipeline::run(&config, &connection, &options, ui.as_mut()).map_err(report)?;
            drop(ui);

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }

        Commands::Download { source } => {
            let config = registry_config(&source)?;
            let options = FetchOptions {
                download_timeout: Duration::from_secs(source.download_timeout),
                ..FetchOptions::default()
            };

            let mut ui = make_ui(cli.quiet);
            let outcome = fetch_archive(&config, &options, ui.as_mut()).map_err(report)?;
            drop(ui);

            println!(
                "Extracted {} files to {:?}",
                outcome.extracted.len(),
                outcome.source_dir
            );
        }

        Commands::ListTables => {
            println!("Tables in load order:\n");
            for table in load_order(ALL_TABLES)? {
                let key = match table.key {
                    TableKey::Natural(column) => column.to_string(),
                    TableKey::Surrogate(column) => format!("{} (generated)", column),
                };
                println!("  {:<10} {:<14} key: {}", table.name, table.source_file, key);
            }
        }

        Commands::Status { db, json } => {
            let connection = db.connection_params()?;
            let config = RegistryConfig::default_in(std::path::Path::new("."));
            let options = ConnectOptions {
                create_if_missing: false,
                timeout: db.timeout(),
                statement_timeout: db.statement_timeout(),
            };
            let statuses = pipeline::status(&config, &connection, options).map_err(report)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                print_status(&statuses);
            }
        }
    }

    Ok(())
}

fn registry_config(source: &SourceArgs) -> Result<RegistryConfig> {
    let config = RegistryConfig::new(source.work_dir.clone())?;
    Ok(match &source.source_url {
        Some(url) => config.with_source_url(url.as_str()),
        None => config,
    })
}

fn make_ui(silent: bool) -> Box<dyn Ui> {
    if silent {
        Box::new(SilentUi::new())
    } else {
        Box::new(ConsoleUi::new())
    }
}

/// Log the failing component, then hand the error to anyhow for the exit code
fn report(e: RegistryError) -> anyhow::Error {
    let component = e.component();
    error!(component, error = %e, "Run aborted");
    anyhow::Error::new(e).context(format!("{} failed", component))
}

fn print_summary(summary: &RunSummary) {
    println!(
        "\n{:<10} {:>10} {:>10} {:>10} {:>10} {:>8}",
        "table", "read", "inserted", "duplicate", "malformed", "secs"
    );
    for t in &summary.tables {
        println!(
            "{:<10} {:>10} {:>10} {:>10} {:>10} {:>8.1}",
            t.table,
            t.rows_read,
            t.inserted,
            t.duplicates,
            t.malformed,
            t.elapsed.as_secs_f64()
        );
    }
    println!(
        "\nLoaded {} rows into {} ({} skipped) in {:.1}s",
        summary.total_inserted(),
        summary.target,
        summary.total_skipped(),
        summary.elapsed.as_secs_f64()
    );
}

fn print_status(statuses: &[TableStatus]) {
    for status in statuses {
        match status.rows {
            Some(rows) => println!("  {:<10} {:>10}", status.table, rows),
            None => println!("  {:<10} {:>10}", status.table, "missing"),
        }
    }
}
