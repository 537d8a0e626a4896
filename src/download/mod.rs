//! Fetching the registry archive
//!
//! [`fetch_archive`] downloads the archive (or reuses a local copy), extracts
//! it, and checks that every configured source file is present.

pub mod cache;
pub mod client;
pub mod extract;

pub use cache::*;
pub use client::*;
pub use extract::*;

use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::ui::{Phase, Ui};

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Use the archive or extracts already on disk; never touch the network
    pub reuse_local: bool,
    pub connect_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            reuse_local: false,
            connect_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(600),
        }
    }
}

/// What the fetch step did
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Bytes downloaded, `None` when a local copy was reused
    pub downloaded_bytes: Option<u64>,
    /// Files written by extraction, empty when existing extracts were reused
    pub extracted: Vec<PathBuf>,
    /// Directory holding the source files
    pub source_dir: PathBuf,
}

/// Make the source files available in `config.extract_dir`
pub fn fetch_archive(
    config: &RegistryConfig,
    options: &FetchOptions,
    ui: &mut dyn Ui,
) -> Result<FetchOutcome> {
    let downloaded_bytes = if options.reuse_local {
        info!(archive = %config.zip_path.display(), "Skipping download, reusing local copy");
        None
    } else {
        ui.set_phase(Phase::Downloading);
        let client = RegistryClient::new(options.connect_timeout, options.download_timeout)?;
        Some(client.download_zip(&config.source_url, &config.zip_path, ui)?)
    };

    let extracted = if config.zip_path.is_file() {
        ui.set_phase(Phase::Extracting);
        extract_zip(&config.zip_path, &config.extract_dir, ui)?
    } else if config.extract_dir.is_dir() {
        info!(dir = %config.extract_dir.display(), "No local archive, using extracted files");
        Vec::new()
    } else {
        return Err(RegistryError::Extract {
            path: config.zip_path.clone(),
            message: "no local archive or extracted files to reuse".into(),
            source: None,
        });
    };

    let missing = missing_sources(&config.extract_dir, &config.tables);
    if !missing.is_empty() {
        return Err(RegistryError::Extract {
            path: config.zip_path.clone(),
            message: format!("archive is missing {}", missing.join(", ")),
            source: None,
        });
    }

    Ok(FetchOutcome {
        downloaded_bytes,
        extracted,
        source_dir: config.extract_dir.clone(),
    })
}
