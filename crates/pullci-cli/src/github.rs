//! GitHub API client for pull request listing, commit status and checkout.

use crate::git;
use async_trait::async_trait;
use pullci_config::GitHubSettings;
use pullci_core::repository::RemoteMetadata;
use pullci_core::source::{CommitRef, CommitStatus, OpenPullRequest, SourceControl};
use pullci_core::{Error, Repository, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const PER_PAGE: usize = 100;
/// GitHub rejects longer status descriptions.
const MAX_DESCRIPTION: usize = 140;
const STATUS_CONTEXT: &str = "pullci";

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Repository name '{0}' is not of the form owner/name")]
    InvalidName(String),
}

impl From<GitHubError> for Error {
    fn from(e: GitHubError) -> Self {
        Error::SourceControl(e.to_string())
    }
}

/// GitHub API client.
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    access_token: Option<String>,
}

impl GitHubClient {
    pub fn new(settings: &GitHubSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: settings.api_url.clone(),
            access_token: settings.resolve_token(),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("User-Agent", "pullci")
            .header("Accept", "application/vnd.github+json");
        match &self.access_token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    fn repo_url(&self, repo: &Repository) -> std::result::Result<String, GitHubError> {
        let (owner, name) = repo
            .owner_and_name()
            .ok_or_else(|| GitHubError::InvalidName(repo.full_name.clone()))?;
        Ok(format!("{}/repos/{}/{}", self.api_url, owner, name))
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> std::result::Result<T, GitHubError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GitHubError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api(format!(
                "Failed to {} ({}): {}",
                what, status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GitHubError::Parse(e.to_string()))
    }

    /// Get a repository's metadata.
    pub async fn get_repo(&self, repo: &Repository) -> std::result::Result<GitHubRepo, GitHubError> {
        let url = self.repo_url(repo)?;
        self.send_json(self.request(reqwest::Method::GET, &url), "get repository")
            .await
    }

    /// Fetch remote metadata once and attach it to the repository.
    pub async fn resolve_repository(
        &self,
        repo: Repository,
    ) -> std::result::Result<Repository, GitHubError> {
        let remote = self.get_repo(&repo).await?;
        debug!(repo = %repo.key, remote = %remote.full_name, "Resolved repository");
        Ok(repo.with_remote(remote.into()))
    }

    /// List every open pull request, following pagination.
    pub async fn list_pulls(
        &self,
        repo: &Repository,
    ) -> std::result::Result<Vec<GitHubPull>, GitHubError> {
        let base = self.repo_url(repo)?;
        let mut pulls = Vec::new();

        for page in 1.. {
            let url = format!(
                "{}/pulls?state=open&sort=created&direction=asc&per_page={}&page={}",
                base, PER_PAGE, page
            );
            let batch: Vec<GitHubPull> = self
                .send_json(self.request(reqwest::Method::GET, &url), "list pull requests")
                .await?;
            let last = batch.len() < PER_PAGE;
            pulls.extend(batch);
            if last {
                break;
            }
        }

        Ok(pulls)
    }

    /// Create a commit status.
    pub async fn create_status(
        &self,
        repo: &Repository,
        sha: &str,
        status: &CommitStatus,
    ) -> std::result::Result<(), GitHubError> {
        let url = format!("{}/statuses/{}", self.repo_url(repo)?, sha);
        let body = StatusRequest::from_status(status);

        let _: serde_json::Value = self
            .send_json(
                self.request(reqwest::Method::POST, &url).json(&body),
                "create status",
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn list_open_pull_requests(&self, repo: &Repository) -> Result<Vec<OpenPullRequest>> {
        let pulls = self.list_pulls(repo).await?;
        Ok(pulls.into_iter().map(OpenPullRequest::from).collect())
    }

    async fn set_commit_status(
        &self,
        repo: &Repository,
        head: &CommitRef,
        status: &CommitStatus,
    ) -> Result<()> {
        debug!(repo = %repo.key, sha = %head, state = %status.state, "Posting commit status");
        Ok(self.create_status(repo, head.as_str(), status).await?)
    }

    async fn checkout(&self, repo: &Repository, pull: &OpenPullRequest, dir: &Path) -> Result<()> {
        let remote = repo
            .remote
            .clone_url
            .clone()
            .unwrap_or_else(|| format!("https://github.com/{}.git", repo.full_name));

        git::checkout_pull(dir, &remote, pull.number, self.access_token.as_deref())
            .await
            .map_err(|e| Error::SourceControl(format!("checkout of pull {} failed: {}", pull.number, e)))
    }
}

/// GitHub repository information.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub clone_url: String,
}

impl From<GitHubRepo> for RemoteMetadata {
    fn from(repo: GitHubRepo) -> Self {
        Self {
            description: repo.description,
            html_url: Some(repo.html_url),
            clone_url: Some(repo.clone_url),
        }
    }
}

/// GitHub pull request, as listed.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPull {
    pub number: u64,
    pub title: String,
    pub html_url: Option<String>,
    pub head: GitHubHead,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubHead {
    pub sha: String,
}

impl From<GitHubPull> for OpenPullRequest {
    fn from(pull: GitHubPull) -> Self {
        Self {
            number: pull.number,
            head: CommitRef::new(pull.head.sha),
            title: pull.title,
            html_url: pull.html_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_url: Option<&'a str>,
    description: String,
    context: &'static str,
}

impl<'a> StatusRequest<'a> {
    fn from_status(status: &'a CommitStatus) -> Self {
        Self {
            state: status.state.as_str(),
            target_url: status.details_url.as_deref(),
            description: truncate(&status.description, MAX_DESCRIPTION),
            context: STATUS_CONTEXT,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}
