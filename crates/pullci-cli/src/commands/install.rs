//! Install and uninstall commands.

use super::{Server, settings_path};
use crate::registry::{find_installed, load_installed};
use anyhow::{Context, Result, bail};
use pullci_config::load_repository;
use std::path::Path;
use tracing::{info, warn};

pub fn install(config: Option<&Path>, path: &Path) -> Result<()> {
    let server = Server::load(config)?;
    let path = settings_path(path)?;
    let repo = load_repository(&path)
        .with_context(|| format!("Invalid repository settings {}", path.display()))?;

    let mut db = server.db.load()?;
    if db.installed.contains(&path) {
        bail!("{} is already installed", path.display());
    }
    let registry = load_installed(&db.installed);
    if let Some(existing) = find_installed(&registry, &repo) {
        let existing_path = existing
            .settings_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        bail!("{} is already installed from {}", repo.key, existing_path);
    }

    let mut ledger = server.archive.load()?;
    ledger.install(&repo.key);
    server.archive.save(&ledger)?;

    db.install(&path);
    server.db.save(&db)?;

    info!(repo = %repo.key, path = %path.display(), "Installed repository");
    println!("Installed {} from {}", repo.key, path.display());
    Ok(())
}

pub fn uninstall(config: Option<&Path>, path: &Path) -> Result<()> {
    let server = Server::load(config)?;
    let path = settings_path(path)?;

    let mut db = server.db.load()?;
    if !db.uninstall(&path) {
        bail!("{} is not installed", path.display());
    }

    match load_repository(&path) {
        Ok(repo) => {
            let mut ledger = server.archive.load()?;
            let dropped = ledger.uninstall(&repo.key).map(|r| r.len()).unwrap_or(0);
            server.archive.save(&ledger)?;
            db.forget_status(&repo.key);
            info!(repo = %repo.key, records = dropped, "Dropped archived pull requests");
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Cannot read settings; archived pull requests were kept"
            );
        }
    }

    server.db.save(&db)?;
    println!("Uninstalled {}", path.display());
    Ok(())
}
