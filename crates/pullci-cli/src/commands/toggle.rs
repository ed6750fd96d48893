//! Enable and disable commands.

use super::Server;
use anyhow::Result;
use std::path::Path;
use tracing::info;

pub fn set_enabled(config: Option<&Path>, enabled: bool) -> Result<()> {
    let server = Server::load(config)?;
    let mut db = server.db.load()?;

    if db.enabled == enabled {
        println!("Server is already {}", state(enabled));
        return Ok(());
    }

    db.enabled = enabled;
    server.db.save(&db)?;
    info!(enabled, "Updated server state");
    println!("Server {}", state(enabled));
    Ok(())
}

fn state(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}
