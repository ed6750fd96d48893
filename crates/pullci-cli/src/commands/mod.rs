//! CLI command implementations.

pub mod cron;
pub mod install;
pub mod list;
pub mod toggle;
pub mod validate;

use anyhow::{Context, Result};
use pullci_archive::{ArchiveStore, ServerDbStore};
use pullci_config::{ServerConfig, default_config_path, load_server_config};
use std::path::{Path, PathBuf};

/// The server configuration and the stores it points at.
pub struct Server {
    pub config: ServerConfig,
    pub archive: ArchiveStore,
    pub db: ServerDbStore,
}

impl Server {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = config_path(explicit)?;
        let config = load_server_config(&path)
            .with_context(|| format!("Invalid server configuration {}", path.display()))?;

        Ok(Self {
            archive: ArchiveStore::new(&config.archive),
            db: ServerDbStore::new(&config.datafile),
            config,
        })
    }
}

pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path().context("Cannot locate the home directory; pass --config"),
    }
}

/// Absolute form of a settings path, as stored in the server database.
pub fn settings_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))
}
