//! In-memory collaborators for scheduler tests.

use async_trait::async_trait;
use chrono::Utc;
use pullci_archive::{ArchiveStore, ServerDbStore};
use pullci_core::notify::{Notification, Notifier};
use pullci_core::runner::{TestPlan, TestResult, TestRunner};
use pullci_core::source::{CommitRef, CommitStatus, OpenPullRequest, SourceControl};
use pullci_core::{ArchiveLedger, Error, Repository, RepositoryRegistry, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::CiContext;

pub fn pull(number: u64) -> OpenPullRequest {
    OpenPullRequest {
        number,
        head: CommitRef::new(format!("sha-{}", number)),
        title: format!("Change {}", number),
        html_url: Some(format!("https://github.com/acme/widget/pull/{}", number)),
    }
}

pub fn repository(name: &str, staging: &Path, commands: &[&str]) -> Repository {
    let mut repo = Repository::new(name, staging);
    repo.testing.commands = commands.iter().map(|c| c.to_string()).collect();
    repo
}

#[derive(Default)]
pub struct MockSource {
    pub pulls: Vec<OpenPullRequest>,
    pub fail_checkout: HashSet<u64>,
    pub fail_listing: bool,
    pub statuses: Mutex<Vec<(String, CommitStatus)>>,
    pub checkouts: Mutex<Vec<(u64, PathBuf)>>,
}

impl MockSource {
    pub fn with_pulls(numbers: &[u64]) -> Self {
        Self {
            pulls: numbers.iter().copied().map(pull).collect(),
            ..Default::default()
        }
    }

    pub fn statuses_for(&self, number: u64) -> Vec<CommitStatus> {
        let head = format!("sha-{}", number);
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| *h == head)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

#[async_trait]
impl SourceControl for MockSource {
    async fn list_open_pull_requests(&self, _repo: &Repository) -> Result<Vec<OpenPullRequest>> {
        if self.fail_listing {
            return Err(Error::SourceControl("listing unavailable".to_string()));
        }
        Ok(self.pulls.clone())
    }

    async fn set_commit_status(
        &self,
        _repo: &Repository,
        head: &CommitRef,
        status: &CommitStatus,
    ) -> Result<()> {
        self.statuses
            .lock()
            .unwrap()
            .push((head.to_string(), status.clone()));
        Ok(())
    }

    async fn checkout(&self, _repo: &Repository, pull: &OpenPullRequest, dir: &Path) -> Result<()> {
        if self.fail_checkout.contains(&pull.number) {
            return Err(Error::SourceControl(format!("cannot fetch pull {}", pull.number)));
        }
        self.checkouts
            .lock()
            .unwrap()
            .push((pull.number, dir.to_path_buf()));
        Ok(())
    }
}

/// Returns fixed exit codes in reverse index order and snapshots the
/// archive each time it is asked to run. A plan containing a command from
/// `fail_for` fails to launch once; the command is then forgotten.
pub struct MockRunner {
    pub codes: Vec<i32>,
    pub fail_for: Mutex<HashSet<String>>,
    pub archive: Option<ArchiveStore>,
    pub plans: Mutex<Vec<TestPlan>>,
    pub snapshots: Mutex<Vec<ArchiveLedger>>,
}

impl MockRunner {
    pub fn with_codes(codes: &[i32]) -> Self {
        Self {
            codes: codes.to_vec(),
            fail_for: Mutex::new(HashSet::new()),
            archive: None,
            plans: Mutex::new(Vec::new()),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_for(self, command: &str) -> Self {
        self.fail_for.lock().unwrap().insert(command.to_string());
        self
    }

    pub fn observing(mut self, archive: ArchiveStore) -> Self {
        self.archive = Some(archive);
        self
    }
}

#[async_trait]
impl TestRunner for MockRunner {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn run(&self, plan: &TestPlan) -> Result<Vec<TestResult>> {
        if let Some(archive) = &self.archive {
            self.snapshots.lock().unwrap().push(archive.load().unwrap());
        }
        self.plans.lock().unwrap().push(plan.clone());

        let mut fail_for = self.fail_for.lock().unwrap();
        if let Some((index, command)) = plan
            .commands
            .iter()
            .enumerate()
            .find(|(_, c)| fail_for.contains(*c))
        {
            fail_for.remove(command);
            return Err(Error::Spawn {
                index,
                command: command.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such shell"),
            });
        }
        drop(fail_for);

        Ok(plan
            .commands
            .iter()
            .enumerate()
            .rev()
            .map(|(index, _)| TestResult {
                index,
                end: Utc::now(),
                code: self.codes.get(index).copied().unwrap_or(0),
                output_path: plan.working_dir.join(format!("test-{}.out", index)),
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub events: Mutex<Vec<Notification>>,
}

impl MockNotifier {
    pub fn kinds(&self) -> Vec<(u64, String)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|n| (n.pull(), n.kind().to_string()))
            .collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, _repo: &Repository, notification: &Notification) -> Result<()> {
        self.events.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub fn context(
    dir: &Path,
    repos: Vec<Repository>,
    source: Arc<MockSource>,
    runner: Arc<MockRunner>,
    notifier: Arc<MockNotifier>,
) -> CiContext {
    CiContext::new(
        ArchiveStore::new(dir.join("archive.json")),
        ServerDbStore::new(dir.join("data.json")),
        repos.into_iter().collect::<RepositoryRegistry>(),
        source,
        runner,
        notifier,
    )
}
