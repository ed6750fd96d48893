//! Archive ledger persistence.

use crate::{ArchiveResult, atomic};
use pullci_core::ArchiveLedger;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The on-disk archive of processed pull requests.
///
/// Callers load the ledger, mutate it, and save it back whole. Every save
/// replaces the file atomically.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    path: PathBuf,
}

impl ArchiveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger. A missing or corrupt file yields an empty ledger;
    /// a file that cannot be read is an error.
    pub fn load(&self) -> ArchiveResult<ArchiveLedger> {
        atomic::load_or_default(&self.path, "archive")
    }

    pub fn save(&self, ledger: &ArchiveLedger) -> ArchiveResult<()> {
        debug!(path = %self.path.display(), "Saving archive");
        atomic::save(&self.path, ledger, "archive")
    }
}
