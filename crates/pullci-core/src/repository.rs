//! Repository descriptors for monitored source repositories.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::notify::EventKind;

/// Stable key of a repository: its lowercased full name (`owner/name`).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct RepoKey(String);

impl RepoKey {
    pub fn new(full_name: &str) -> Self {
        Self(full_name.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RepoKey {
    fn from(full_name: &str) -> Self {
        Self::new(full_name)
    }
}

/// The ordered list of shell commands that make up a repository's test suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestingSettings {
    /// Commands in configuration order. Result indices refer to this order.
    pub commands: Vec<String>,
    /// Allowed minutes for the whole suite. Carried through, never enforced.
    pub timeout_minutes: Option<u32>,
}

/// Whether a static entry is a single file or a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaticKind {
    File,
    Folder,
}

/// A locally available file or folder copied into the staging directory
/// before the pull request is checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCopy {
    pub kind: StaticKind,
    /// Absolute source path on this machine.
    pub source: PathBuf,
    /// Target path relative to the staging directory.
    pub target: PathBuf,
}

/// Scheduling and notification settings for a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSettings {
    /// Minutes that must elapse after a finished check before the next one.
    pub frequency_minutes: u32,
    /// Addresses that receive notifications.
    pub recipients: Vec<String>,
    /// Events recipients want to hear about. Empty means every event.
    pub notify: Vec<EventKind>,
}

impl Default for CronSettings {
    fn default() -> Self {
        Self {
            frequency_minutes: 5,
            recipients: Vec::new(),
            notify: Vec::new(),
        }
    }
}

/// Remote metadata fetched once when a repository is resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    pub description: Option<String>,
    pub html_url: Option<String>,
    pub clone_url: Option<String>,
}

/// A monitored repository as consumed by the scheduler and processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub key: RepoKey,
    /// Full name as written in the settings file (`Owner/Name`).
    pub full_name: String,
    /// Account used to talk to the source-control host.
    pub user: Option<String>,
    /// Owning organization, when the repository is not owned by `user`.
    pub organization: Option<String>,
    /// Absolute path of the local working copy.
    pub staging: PathBuf,
    pub testing: TestingSettings,
    pub statics: Vec<StaticCopy>,
    pub cron: CronSettings,
    pub remote: RemoteMetadata,
    /// Settings file this repository was loaded from.
    pub settings_path: Option<PathBuf>,
}

impl Repository {
    pub fn new(full_name: impl Into<String>, staging: impl Into<PathBuf>) -> Self {
        let full_name = full_name.into();
        Self {
            key: RepoKey::new(&full_name),
            full_name,
            user: None,
            organization: None,
            staging: staging.into(),
            testing: TestingSettings::default(),
            statics: Vec::new(),
            cron: CronSettings::default(),
            remote: RemoteMetadata::default(),
            settings_path: None,
        }
    }

    /// Split the full name into `(owner, name)`.
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        self.full_name.split_once('/')
    }

    /// Whether recipients asked to be told about `kind`.
    pub fn wants(&self, kind: EventKind) -> bool {
        self.cron.notify.is_empty() || self.cron.notify.contains(&kind)
    }

    pub fn with_remote(mut self, remote: RemoteMetadata) -> Self {
        self.remote = remote;
        self
    }
}

/// Installed repositories in stable key order.
#[derive(Debug, Clone, Default)]
pub struct RepositoryRegistry {
    repos: BTreeMap<RepoKey, Repository>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a repository, returning the one it replaced, if any.
    pub fn insert(&mut self, repo: Repository) -> Option<Repository> {
        self.repos.insert(repo.key.clone(), repo)
    }

    pub fn get(&self, key: &RepoKey) -> Option<&Repository> {
        self.repos.get(key)
    }

    pub fn contains(&self, key: &RepoKey) -> bool {
        self.repos.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Repository> {
        self.repos.values()
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}

impl FromIterator<Repository> for RepositoryRegistry {
    fn from_iter<I: IntoIterator<Item = Repository>>(iter: I) -> Self {
        let mut registry = Self::new();
        for repo in iter {
            registry.insert(repo);
        }
        registry
    }
}
