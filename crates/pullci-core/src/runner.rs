//! Test runner trait and result types.
//!
//! A runner executes every configured test command of a repository against
//! a staged working copy and reports one result per command.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::Result;

/// Everything a runner needs to execute a repository's test suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPlan {
    /// Staging directory the commands run in and write their output to.
    pub working_dir: PathBuf,
    /// Shell commands in configuration order.
    pub commands: Vec<String>,
    /// Configured allowance for the suite. Runners do not enforce it.
    pub timeout: Option<Duration>,
}

impl TestPlan {
    pub fn new(working_dir: impl Into<PathBuf>, commands: Vec<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            commands,
            timeout: None,
        }
    }

    pub fn with_timeout_minutes(mut self, minutes: Option<u32>) -> Self {
        self.timeout = minutes.map(|m| Duration::from_secs(u64::from(m) * 60));
        self
    }
}

/// Raw result of one test command, as reported by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Position of the command in [`TestPlan::commands`].
    pub index: usize,
    pub end: DateTime<Utc>,
    /// Process exit code; `-1` when the process was terminated by a signal.
    pub code: i32,
    /// File holding the command's standard output.
    pub output_path: PathBuf,
}

/// A result reconciled with the command that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub index: usize,
    pub command: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub code: i32,
    pub output_path: PathBuf,
}

impl TestOutcome {
    pub fn from_result(command: impl Into<String>, start: DateTime<Utc>, result: TestResult) -> Self {
        Self {
            index: result.index,
            command: command.into(),
            start,
            end: result.end,
            code: result.code,
            output_path: result.output_path,
        }
    }

    /// Exit codes 0 and 1 both count towards the success percentage.
    pub fn is_success(&self) -> bool {
        self.code == 0 || self.code == 1
    }

    /// Exit code 1 reports a slowdown: successful, but degraded.
    pub fn is_degraded(&self) -> bool {
        self.code == 1
    }

    /// Whole seconds between launch and exit.
    pub fn elapsed_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds().max(0)
    }
}

/// Trait for test runners.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Name of this runner.
    fn name(&self) -> &'static str;

    /// Run every command of the plan and wait for all of them to exit.
    ///
    /// Results may come back in any order; each carries the index of its
    /// command. A non-zero exit code is data, not an error. An error means
    /// a command could not be launched at all.
    async fn run(&self, plan: &TestPlan) -> Result<Vec<TestResult>>;
}
