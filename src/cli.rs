use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{DEFAULT_BATCH_SIZE, DEFAULT_DB_PATH};
use crate::logging::LogFormat;
use crate::writer::{ConnectionParams, ServerAuth, ServerParams};

#[derive(Parser, Debug)]
#[command(name = "faa-registry")]
#[command(version, about = "Load the FAA aircraft registry into SQLite or PostgreSQL")]
pub struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors, no progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the registry (unless skipped) and load every table
    Load {
        #[command(flatten)]
        db: DatabaseArgs,

        #[command(flatten)]
        source: SourceArgs,

        /// Rows per insert transaction
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE as u64, value_parser = clap::value_parser!(u64).range(1..))]
        batch_size: u64,

        /// Reuse the archive or extracted files already in the work directory
        #[arg(long)]
        skip_download: bool,

        /// Fail instead of creating a missing database
        #[arg(long)]
        no_create_db: bool,

        /// Keep existing rows and only add new keys
        #[arg(long)]
        keep_existing: bool,

        /// Create FOREIGN KEY constraints for registry references
        #[arg(long)]
        enforce_foreign_keys: bool,

        /// Only load these tables and their parents (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        include: Option<Vec<String>>,

        /// Skip these tables and their dependents (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Download and extract the registry archive only
    Download {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// List tables in load order
    ListTables,

    /// Show row counts of an existing database
    Status {
        #[command(flatten)]
        db: DatabaseArgs,

        /// Print the counts as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

/// Database backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// Local SQLite file
    #[value(alias = "sqlite")]
    Embedded,
    /// PostgreSQL server
    #[value(alias = "postgres")]
    Server,
}

#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Database backend
    #[arg(long, value_enum, default_value_t = Engine::Embedded)]
    pub engine: Engine,

    /// SQLite database file (embedded engine)
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Server as host or host:port (server engine)
    #[arg(long)]
    pub server: Option<String>,

    /// Database name (server engine)
    #[arg(long)]
    pub database: Option<String>,

    /// Authenticate as the current OS user; any password is ignored
    #[arg(long, conflicts_with = "username")]
    pub trusted: bool,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long, env = "FAA_DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Server-side limit per statement in seconds, 0 for none (server engine)
    #[arg(long, default_value_t = 0)]
    pub statement_timeout: u64,
}

impl DatabaseArgs {
    /// Validate the flag combination for the chosen engine
    pub fn connection_params(&self) -> Result<ConnectionParams> {
        match self.engine {
            Engine::Embedded => Ok(ConnectionParams::Embedded {
                path: self.db_path.clone(),
            }),
            Engine::Server => {
                let (Some(server), Some(database)) = (&self.server, &self.database) else {
                    bail!("--engine server requires --server and --database");
                };
                let auth = match (self.trusted, &self.username, &self.password) {
                    (true, _, _) => ServerAuth::Trusted,
                    (false, Some(username), Some(password)) => ServerAuth::Password {
                        username: username.clone(),
                        password: password.clone(),
                    },
                    _ => bail!("--engine server requires --trusted or --username and --password"),
                };
                Ok(ConnectionParams::Server(ServerParams::new(server, database, auth)))
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.statement_timeout > 0).then(|| Duration::from_secs(self.statement_timeout))
    }
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Directory for the archive and extracted files (default: user cache dir)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Archive URL
    #[arg(long)]
    pub source_url: Option<String>,

    /// Seconds allowed for the whole archive download
    #[arg(long, default_value_t = 600)]
    pub download_timeout: u64,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
