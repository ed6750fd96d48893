//! Validate command.

use super::config_path;
use anyhow::{Context, Result, bail};
use pullci_config::{load_repository, load_server_config};
use std::path::{Path, PathBuf};

pub fn run(config: Option<&Path>, repos: &[PathBuf]) -> Result<()> {
    let path = config_path(config)?;
    let server = load_server_config(&path)
        .with_context(|| format!("Invalid server configuration {}", path.display()))?;
    println!("Server configuration is valid");
    println!("  datafile: {}", server.datafile.display());
    println!("  archive:  {}", server.archive.display());

    let mut failed = 0;
    for repo_path in repos {
        match load_repository(repo_path) {
            Ok(repo) => println!(
                "{}: {} ({} test commands)",
                repo_path.display(),
                repo.key,
                repo.testing.commands.len()
            ),
            Err(e) => {
                println!("{}: {}", repo_path.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} repository settings file(s) are invalid", failed);
    }
    Ok(())
}
