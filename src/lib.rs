pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod ui;
pub mod writer;

pub use cli::{Cli, Commands};
pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use pipeline::{run, PipelineOptions, RunSummary};
pub use ui::{ConsoleUi, Phase, SilentUi, Ui};
