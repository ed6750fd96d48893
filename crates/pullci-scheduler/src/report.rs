//! Finalization of a test run: success percentage, degradation, and the
//! commit status that reports them.

use chrono::{DateTime, Utc};
use pullci_core::notify::RunResults;
use pullci_core::runner::{TestOutcome, TestResult};
use pullci_core::source::{CommitState, CommitStatus};
use pullci_core::{Error, Result};
use tracing::warn;

const EPSILON: f64 = 1e-12;
const SLOWDOWN_NOTE: &str = " Slowdown reported.";

/// Results of every command of one pull request, in configuration order.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub outcomes: Vec<TestOutcome>,
    /// Fraction of commands whose exit code was 0 or 1.
    pub percent: f64,
    /// Some command exited with code 1.
    pub degraded: bool,
    pub total_seconds: i64,
}

impl TestReport {
    /// Match runner results to `commands` by index. Every command launched at
    /// `start`; results may arrive in any order.
    pub fn reconcile(
        commands: &[String],
        start: DateTime<Utc>,
        results: Vec<TestResult>,
    ) -> Result<Self> {
        if commands.is_empty() {
            return Err(Error::InvalidInput("no test commands configured".to_string()));
        }

        let mut slots: Vec<Option<TestResult>> = vec![None; commands.len()];
        for result in results {
            match slots.get_mut(result.index) {
                Some(slot) => *slot = Some(result),
                None => warn!(index = result.index, "Discarding result for unknown test index"),
            }
        }

        let outcomes = commands
            .iter()
            .zip(slots)
            .enumerate()
            .map(|(index, (command, result))| {
                result
                    .map(|r| TestOutcome::from_result(command.as_str(), start, r))
                    .ok_or_else(|| Error::Runner(format!("no result for test {}", index)))
            })
            .collect::<Result<Vec<_>>>()?;

        let passed = outcomes.iter().filter(|o| o.is_success()).count();
        Ok(Self {
            percent: passed as f64 / outcomes.len() as f64,
            degraded: outcomes.iter().any(TestOutcome::is_degraded),
            total_seconds: outcomes.iter().map(TestOutcome::elapsed_seconds).sum(),
            outcomes,
        })
    }

    /// Whether every command counted as a success.
    pub fn is_success(&self) -> bool {
        (self.percent - 1.0).abs() < EPSILON
    }

    /// `Results: 66.67% in 12s.`
    pub fn message(&self) -> String {
        format!(
            "Results: {:.2}% in {}s.",
            self.percent * 100.0,
            self.total_seconds
        )
    }

    /// The message, with a slowdown note when any command was degraded.
    pub fn status_message(&self) -> String {
        let mut message = self.message();
        if self.degraded {
            message.push_str(SLOWDOWN_NOTE);
        }
        message
    }

    pub fn commit_status(&self, details_url: Option<String>) -> CommitStatus {
        let status = if self.percent < 1.0 {
            CommitStatus::new(CommitState::Failure, self.message())
        } else if self.degraded {
            CommitStatus::new(CommitState::Pending, self.status_message())
        } else {
            CommitStatus::new(CommitState::Success, self.message())
        };
        status.with_details_url(details_url)
    }

    pub fn run_results(&self) -> RunResults {
        RunResults {
            percent: self.percent,
            status: self.status_message(),
            degraded: self.degraded,
        }
    }
}
