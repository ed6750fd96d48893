//! Notification events handed to the notifier boundary.
//!
//! Each event kind carries a fixed set of typed fields. Renderers that work
//! with string templates can use [`Notification::fields`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::summary::TestSummary;
use crate::{Repository, Result};

/// Kinds of events a renderer may have a template for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Success,
    Failure,
    Error,
    Timeout,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Success => "success",
            EventKind::Failure => "failure",
            EventKind::Error => "error",
            EventKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" => Ok(EventKind::Start),
            "success" => Ok(EventKind::Success),
            "failure" => Ok(EventKind::Failure),
            "error" => Ok(EventKind::Error),
            "timeout" => Ok(EventKind::Timeout),
            _ => Err(format!("Unknown event kind: {}", s)),
        }
    }
}

/// Repository details included with every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFields {
    pub name: String,
    pub description: String,
    pub url: String,
    pub staging: String,
}

impl RepoFields {
    pub fn from_repository(repo: &Repository) -> Self {
        Self {
            name: repo.full_name.clone(),
            description: repo.remote.description.clone().unwrap_or_default(),
            url: repo.remote.html_url.clone().unwrap_or_default(),
            staging: repo.staging.display().to_string(),
        }
    }
}

/// Outcome figures of a finished test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    /// Fraction of commands that succeeded, in `0.0..=1.0`.
    pub percent: f64,
    /// `Results: {percent}% in {seconds}s.`, plus a slowdown note if degraded.
    pub status: String,
    /// At least one command exited with code 1.
    pub degraded: bool,
}

impl RunResults {
    /// Percent formatted for display, e.g. `66.67%`.
    pub fn percent_display(&self) -> String {
        format!("{:.2}%", self.percent * 100.0)
    }
}

/// A structured event emitted by the pull request processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Notification {
    Start {
        repo: RepoFields,
        pull: u64,
        tests: TestSummary,
    },
    Success {
        repo: RepoFields,
        pull: u64,
        tests: TestSummary,
        results: RunResults,
    },
    Failure {
        repo: RepoFields,
        pull: u64,
        tests: TestSummary,
        results: RunResults,
    },
    Error {
        repo: RepoFields,
        pull: u64,
        tests: TestSummary,
        message: String,
    },
}

impl Notification {
    pub fn kind(&self) -> EventKind {
        match self {
            Notification::Start { .. } => EventKind::Start,
            Notification::Success { .. } => EventKind::Success,
            Notification::Failure { .. } => EventKind::Failure,
            Notification::Error { .. } => EventKind::Error,
        }
    }

    pub fn pull(&self) -> u64 {
        match self {
            Notification::Start { pull, .. }
            | Notification::Success { pull, .. }
            | Notification::Failure { pull, .. }
            | Notification::Error { pull, .. } => *pull,
        }
    }

    pub fn repo(&self) -> &RepoFields {
        match self {
            Notification::Start { repo, .. }
            | Notification::Success { repo, .. }
            | Notification::Failure { repo, .. }
            | Notification::Error { repo, .. } => repo,
        }
    }

    pub fn tests(&self) -> &TestSummary {
        match self {
            Notification::Start { tests, .. }
            | Notification::Success { tests, .. }
            | Notification::Failure { tests, .. }
            | Notification::Error { tests, .. } => tests,
        }
    }

    /// Flatten the event into template fields.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let repo = self.repo();
        let tests = self.tests();
        let mut fields = BTreeMap::from([
            ("repo.name".to_string(), repo.name.clone()),
            ("repo.description".to_string(), repo.description.clone()),
            ("repo.url".to_string(), repo.url.clone()),
            ("repo.staging".to_string(), repo.staging.clone()),
            ("pull.number".to_string(), self.pull().to_string()),
            ("tests.text".to_string(), tests.text.clone()),
            ("tests.markup".to_string(), tests.markup.clone()),
        ]);

        match self {
            Notification::Success { results, .. } | Notification::Failure { results, .. } => {
                fields.insert("percent".to_string(), results.percent_display());
                fields.insert("status".to_string(), results.status.clone());
            }
            Notification::Error { message, .. } => {
                fields.insert("message".to_string(), message.clone());
            }
            Notification::Start { .. } => {}
        }

        fields
    }
}

/// Trait for notification sinks.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, repo: &Repository, notification: &Notification) -> Result<()>;
}
