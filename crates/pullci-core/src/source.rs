//! Source-control collaborator: open pull requests, commit status, checkout.

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Repository, Result};

/// Opaque reference to the head commit of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct CommitRef(String);

impl CommitRef {
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An open pull request as listed by the source-control host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPullRequest {
    pub number: u64,
    pub head: CommitRef,
    pub title: String,
    pub html_url: Option<String>,
}

/// Commit status states understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        }
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status posted against a pull request's head commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub state: CommitState,
    pub details_url: Option<String>,
    pub description: String,
}

impl CommitStatus {
    pub fn new(state: CommitState, description: impl Into<String>) -> Self {
        Self {
            state,
            details_url: None,
            description: description.into(),
        }
    }

    pub fn with_details_url(mut self, url: Option<String>) -> Self {
        self.details_url = url;
        self
    }
}

/// Trait for source-control hosts.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// List the repository's currently open pull requests.
    async fn list_open_pull_requests(&self, repo: &Repository) -> Result<Vec<OpenPullRequest>>;

    /// Post a status against a commit.
    async fn set_commit_status(
        &self,
        repo: &Repository,
        head: &CommitRef,
        status: &CommitStatus,
    ) -> Result<()>;

    /// Materialize the pull request's head in `dir`, which already exists.
    async fn checkout(&self, repo: &Repository, pull: &OpenPullRequest, dir: &Path)
    -> Result<()>;
}
