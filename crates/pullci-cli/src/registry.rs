//! Repository registry construction from installed settings files.

use pullci_config::load_repository;
use pullci_core::{Repository, RepositoryRegistry};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Load every installed settings file. Files that fail to load are logged
/// and left out so the other repositories still get checked.
pub fn load_installed(installed: &[PathBuf]) -> RepositoryRegistry {
    installed
        .iter()
        .filter_map(|path| match load_repository(path) {
            Ok(repo) => {
                debug!(repo = %repo.key, path = %path.display(), "Loaded repository settings");
                Some(repo)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable repository settings");
                None
            }
        })
        .collect()
}

/// The installed repository with the same key as `repo`, if any.
pub fn find_installed<'a>(registry: &'a RepositoryRegistry, repo: &Repository) -> Option<&'a Repository> {
    registry.get(&repo.key)
}
