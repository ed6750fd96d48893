//! Processing ledger types.
//!
//! The ledger maps a repository key to the pull requests processed for it.
//! Pull request numbers are always keyed as strings, both in memory and on
//! disk, so that a reloaded ledger compares exactly like a fresh one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::RepoKey;

/// Ledger key for a pull request number.
pub fn pull_key(number: u64) -> String {
    number.to_string()
}

/// One processing attempt of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub number: u64,
    /// Staging directory the attempt ran in.
    pub stage: PathBuf,
    pub start: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    pub completed: bool,
    pub success: bool,
}

impl PullRequestRecord {
    /// A fresh in-progress record, written before any test runs.
    pub fn begin(number: u64, stage: impl Into<PathBuf>, start: DateTime<Utc>) -> Self {
        Self {
            number,
            stage: stage.into(),
            start,
            finished: None,
            completed: false,
            success: false,
        }
    }

    pub fn finalize(&mut self, success: bool, finished: DateTime<Utc>) {
        self.success = success;
        self.completed = true;
        self.finished = Some(finished);
    }

    /// Started but never finalized, e.g. the process died mid-test.
    pub fn is_interrupted(&self) -> bool {
        !self.completed
    }
}

/// Every pull request ever processed, grouped by repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveLedger {
    repos: BTreeMap<RepoKey, BTreeMap<String, PullRequestRecord>>,
}

impl ArchiveLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty entry for a repository. Returns false if it existed.
    pub fn install(&mut self, repo: &RepoKey) -> bool {
        if self.repos.contains_key(repo) {
            return false;
        }
        self.repos.insert(repo.clone(), BTreeMap::new());
        true
    }

    /// Drop a repository and all of its records.
    pub fn uninstall(&mut self, repo: &RepoKey) -> Option<BTreeMap<String, PullRequestRecord>> {
        self.repos.remove(repo)
    }

    pub fn contains_repository(&self, repo: &RepoKey) -> bool {
        self.repos.contains_key(repo)
    }

    pub fn get(&self, repo: &RepoKey, number: u64) -> Option<&PullRequestRecord> {
        self.repos.get(repo)?.get(&pull_key(number))
    }

    pub fn get_mut(&mut self, repo: &RepoKey, number: u64) -> Option<&mut PullRequestRecord> {
        self.repos.get_mut(repo)?.get_mut(&pull_key(number))
    }

    /// Whether the pull request has already been fully processed.
    pub fn is_completed(&self, repo: &RepoKey, number: u64) -> bool {
        self.get(repo, number).is_some_and(|r| r.completed)
    }

    /// Insert or replace the record for `record.number`.
    pub fn record(&mut self, repo: &RepoKey, record: PullRequestRecord) {
        self.repos
            .entry(repo.clone())
            .or_default()
            .insert(pull_key(record.number), record);
    }

    /// Records of one repository in key order.
    pub fn records(&self, repo: &RepoKey) -> impl Iterator<Item = &PullRequestRecord> {
        self.repos.get(repo).into_iter().flat_map(|m| m.values())
    }

    pub fn repositories(&self) -> impl Iterator<Item = &RepoKey> {
        self.repos.keys()
    }
}
