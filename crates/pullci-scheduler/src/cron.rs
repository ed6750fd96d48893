//! Cron cycle - picks the repository that is due for a check, drains it,
//! and repeats until nothing is due.

use crate::processor::{PullReport, PullRequestProcessor};
use crate::{CiContext, SchedulerResult};
use chrono::{DateTime, Utc};
use pullci_archive::{CronStatus, ServerDb};
use pullci_core::{RepoKey, RepositoryRegistry};
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Whether a repository with `status` and `frequency_minutes` is due at `now`.
///
/// Never having finished a run makes a repository due. A run that started
/// after the last recorded end is still in progress and is never due.
pub fn is_eligible(status: Option<&CronStatus>, frequency_minutes: u32, now: DateTime<Utc>) -> bool {
    let Some(status) = status else {
        return true;
    };
    if status.is_running() {
        return false;
    }
    match status.end {
        None => true,
        Some(end) => (now - end).num_minutes() > i64::from(frequency_minutes),
    }
}

/// The next repository to check.
///
/// Repositories with a recorded status are considered first, in key order.
/// Failing that, the first installed repository that has no status yet.
pub fn find_next(db: &ServerDb, registry: &RepositoryRegistry, now: DateTime<Utc>) -> Option<RepoKey> {
    let due = db.status.iter().find_map(|(key, status)| {
        let repo = registry.get(key)?;
        is_eligible(Some(status), repo.cron.frequency_minutes, now).then(|| key.clone())
    });

    due.or_else(|| {
        registry
            .iter()
            .find(|repo| !db.status.contains_key(&repo.key))
            .map(|repo| repo.key.clone())
    })
}

/// What happened to one repository during a cycle.
#[derive(Debug, Clone)]
pub struct RepositoryRun {
    pub key: RepoKey,
    pub pulls: Vec<PullReport>,
    /// Set when the repository could not be processed at all.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub runs: Vec<RepositoryRun>,
    /// The server was disabled and nothing was checked.
    pub skipped: bool,
}

impl CycleReport {
    pub fn pull_count(&self) -> usize {
        self.runs.iter().map(|r| r.pulls.len()).sum()
    }
}

/// One invocation of the scheduler.
pub struct CronCycle<'a> {
    ctx: &'a CiContext,
    clock: fn() -> DateTime<Utc>,
}

impl<'a> CronCycle<'a> {
    pub fn new(ctx: &'a CiContext) -> Self {
        Self {
            ctx,
            clock: Utc::now,
        }
    }

    /// Use a different time source for eligibility and status stamps.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Check every due repository once.
    ///
    /// Returns early with an error only when the ledger or server database
    /// cannot be read or written.
    pub async fn run(&self) -> SchedulerResult<CycleReport> {
        let mut report = CycleReport::default();
        if !self.ctx.db.load()?.enabled {
            warn!("Server is disabled; skipping cron cycle");
            report.skipped = true;
            return Ok(report);
        }

        let mut visited: HashSet<RepoKey> = HashSet::new();

        loop {
            // Reloaded every round in case another invocation touched it.
            let mut db = self.ctx.db.load()?;
            let Some(key) = find_next(&db, &self.ctx.registry, (self.clock)()) else {
                break;
            };
            if !visited.insert(key.clone()) {
                info!(repo = %key, "Repository already checked in this cycle; stopping");
                break;
            }
            let Some(repo) = self.ctx.registry.get(&key) else {
                break;
            };

            info!(repo = %key, "Checking repository");
            db.mark_started(&key, (self.clock)());
            self.ctx.db.save(&db)?;

            let result = PullRequestProcessor::new(self.ctx, repo).run().await;

            let mut db = self.ctx.db.load()?;
            db.mark_finished(&key, (self.clock)());
            let saved = self.ctx.db.save(&db);

            match result {
                Ok(pulls) => {
                    info!(repo = %key, pulls = pulls.len(), "Repository checked");
                    report.runs.push(RepositoryRun {
                        key,
                        pulls,
                        error: None,
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(repo = %key, error = %e, "Repository check failed");
                    report.runs.push(RepositoryRun {
                        key,
                        pulls: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
            saved?;
        }

        Ok(report)
    }
}
