//! Static configuration for a registry load
//!
//! A [`RegistryConfig`] is built once and passed by reference into every
//! pipeline component.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use crate::schema::{TableSchema, ALL_TABLES};

/// FAA releasable aircraft database
pub const FAA_URL: &str = "https://registry.faa.gov/database/ReleasableAircraft.zip";

pub const ZIP_FILE_NAME: &str = "ReleasableAircraft.zip";

pub const EXTRACT_DIR_NAME: &str = "extracted";

pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Default embedded database file, relative to the working directory
pub const DEFAULT_DB_PATH: &str = "faa_registry.db";

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub source_url: String,
    /// Where the downloaded archive is stored
    pub zip_path: PathBuf,
    /// Where archive members are extracted
    pub extract_dir: PathBuf,
    /// Tables to create and load
    pub tables: Vec<&'static TableSchema>,
    /// Every table the database may hold, loaded or not
    pub catalog: Vec<&'static TableSchema>,
    pub batch_size: usize,
}

impl RegistryConfig {
    /// Registry defaults with the archive and extracts under `work_dir`
    pub fn default_in(work_dir: &Path) -> Self {
        Self {
            source_url: FAA_URL.to_string(),
            zip_path: work_dir.join(ZIP_FILE_NAME),
            extract_dir: work_dir.join(EXTRACT_DIR_NAME),
            tables: ALL_TABLES.to_vec(),
            catalog: ALL_TABLES.to_vec(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Registry defaults under `work_dir`, or the platform cache directory
    pub fn new(work_dir: Option<PathBuf>) -> Result<Self> {
        let work_dir = match work_dir {
            Some(dir) => dir,
            None => default_work_dir()?,
        };
        Ok(Self::default_in(&work_dir))
    }

    /// Load only `tables`. The catalog keeps every known table.
    pub fn with_tables(mut self, tables: Vec<&'static TableSchema>) -> Self {
        for &table in &tables {
            if !self.catalog.iter().any(|t| t.name == table.name) {
                self.catalog.push(table);
            }
        }
        self.tables = tables;
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Platform cache directory for downloads
pub fn default_work_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "faa-registry-loader")
        .context("Could not determine cache directory")?;
    Ok(proj_dirs.cache_dir().to_path_buf())
}
