//! List command.

use super::Server;
use anyhow::Result;
use chrono::{DateTime, Utc};
use pullci_config::load_repository;
use std::path::Path;

pub fn run(config: Option<&Path>) -> Result<()> {
    let server = Server::load(config)?;
    let db = server.db.load()?;

    if db.installed.is_empty() {
        println!("No repositories installed");
        return Ok(());
    }

    println!(
        "Server is {}",
        if db.enabled { "enabled" } else { "disabled" }
    );
    println!(
        "{:<32} {:<17} {:<17} SETTINGS",
        "REPOSITORY", "LAST START", "LAST END"
    );

    for path in &db.installed {
        let Ok(repo) = load_repository(path) else {
            println!("{:<32} {:<17} {:<17} {}", "<unreadable>", "-", "-", path.display());
            continue;
        };
        let status = db.status(&repo.key).copied().unwrap_or_default();
        println!(
            "{:<32} {:<17} {:<17} {}",
            repo.key.as_str(),
            fmt_time(status.started),
            fmt_time(status.end),
            path.display()
        );
    }

    Ok(())
}

fn fmt_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}
