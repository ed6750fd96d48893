//! Cron command: one scheduler cycle over every installed repository.

use super::Server;
use crate::github::GitHubClient;
use crate::notifier::SpoolNotifier;
use crate::registry::load_installed;
use anyhow::{Context, Result};
use pullci_config::VariableContextBuilder;
use pullci_core::RepositoryRegistry;
use pullci_runner::LocalShellRunner;
use pullci_scheduler::{CiContext, CronCycle, PullOutcome};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(config: Option<&Path>) -> Result<()> {
    let server = Server::load(config)?;

    let db = server.db.load()?;
    if !db.enabled {
        warn!("Server is disabled; run `pullci enable` to resume");
        return Ok(());
    }

    let github = Arc::new(GitHubClient::new(&server.config.github));
    let registry = resolve_all(&github, load_installed(&db.installed)).await;
    if registry.is_empty() {
        info!("No repositories installed");
        return Ok(());
    }

    let mut vars = VariableContextBuilder::new()
        .with_vars(&server.config.vars)
        .build();
    vars.populate_env();

    let ctx = CiContext::new(
        server.archive,
        server.db,
        registry,
        github,
        Arc::new(LocalShellRunner::new()),
        Arc::new(SpoolNotifier::new(server.config.notifications.clone())),
    )
    .with_vars(vars);

    let report = CronCycle::new(&ctx)
        .run()
        .await
        .context("Cron cycle aborted")?;

    for run in &report.runs {
        if let Some(error) = &run.error {
            println!("{}: not checked ({})", run.key, error);
            continue;
        }
        println!("{}: {} pull request(s)", run.key, run.pulls.len());
        for pull in &run.pulls {
            let outcome = match &pull.outcome {
                PullOutcome::Succeeded { degraded: true, .. } => "passed with slowdown".to_string(),
                PullOutcome::Succeeded { .. } => "passed".to_string(),
                PullOutcome::Failed { percent } => format!("failed ({:.2}%)", percent * 100.0),
                PullOutcome::Errored { message } => format!("error: {}", message),
            };
            println!("  #{} {}", pull.number, outcome);
        }
    }
    info!(
        repositories = report.runs.len(),
        pulls = report.pull_count(),
        "Cron cycle finished"
    );

    Ok(())
}

/// Attach remote metadata to every repository. A repository whose metadata
/// cannot be fetched is still checked, with empty metadata.
async fn resolve_all(github: &GitHubClient, registry: RepositoryRegistry) -> RepositoryRegistry {
    let mut resolved = RepositoryRegistry::new();
    for repo in registry.iter().cloned() {
        let key = repo.key.clone();
        match github.resolve_repository(repo.clone()).await {
            Ok(repo) => {
                resolved.insert(repo);
            }
            Err(e) => {
                warn!(repo = %key, error = %e, "Could not fetch repository metadata");
                resolved.insert(repo);
            }
        }
    }
    resolved
}
