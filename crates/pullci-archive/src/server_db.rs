//! Server database: installed repository files, the enabled flag and
//! per-repository cron status.

use crate::{ArchiveResult, atomic};
use chrono::{DateTime, Utc};
use pullci_core::RepoKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Timestamps of the last cron pass over one repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronStatus {
    pub started: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl CronStatus {
    /// A pass started after the last recorded end and has not finished.
    pub fn is_running(&self) -> bool {
        matches!((self.started, self.end), (Some(s), Some(e)) if s > e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDb {
    /// Absolute paths of installed repository settings files.
    #[serde(default)]
    pub installed: Vec<PathBuf>,
    /// A fresh database is enabled; a saved one without the flag is not.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub status: BTreeMap<RepoKey, CronStatus>,
}

impl Default for ServerDb {
    fn default() -> Self {
        Self {
            installed: Vec::new(),
            enabled: true,
            status: BTreeMap::new(),
        }
    }
}

impl ServerDb {
    /// Add a settings file. Returns false if it was already installed.
    pub fn install(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.installed.contains(&path) {
            return false;
        }
        self.installed.push(path);
        true
    }

    /// Remove a settings file. Returns false if it was not installed.
    pub fn uninstall(&mut self, path: &Path) -> bool {
        let before = self.installed.len();
        self.installed.retain(|p| p != path);
        self.installed.len() != before
    }

    pub fn forget_status(&mut self, key: &RepoKey) -> Option<CronStatus> {
        self.status.remove(key)
    }

    pub fn status(&self, key: &RepoKey) -> Option<&CronStatus> {
        self.status.get(key)
    }

    pub fn mark_started(&mut self, key: &RepoKey, at: DateTime<Utc>) {
        self.status.entry(key.clone()).or_default().started = Some(at);
    }

    pub fn mark_finished(&mut self, key: &RepoKey, at: DateTime<Utc>) {
        self.status.entry(key.clone()).or_default().end = Some(at);
    }
}

/// The on-disk server database.
#[derive(Debug, Clone)]
pub struct ServerDbStore {
    path: PathBuf,
}

impl ServerDbStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the database. A missing or corrupt file yields the default;
    /// a file that cannot be read is an error.
    pub fn load(&self) -> ArchiveResult<ServerDb> {
        atomic::load_or_default(&self.path, "server database")
    }

    pub fn save(&self, db: &ServerDb) -> ArchiveResult<()> {
        debug!(path = %self.path.display(), "Saving server database");
        atomic::save(&self.path, db, "server database")
    }
}
