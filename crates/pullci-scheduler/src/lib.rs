//! Pull request processing and cron scheduling for pullci.
//!
//! A cron cycle picks the next repository that is due for a check, drains
//! its open pull requests one at a time through the [`PullRequestProcessor`],
//! and repeats until no repository is eligible or one comes round twice.

pub mod context;
pub mod cron;
pub mod error;
pub mod processor;
pub mod report;
pub mod staging;

#[cfg(test)]
mod testing;

pub use context::CiContext;
pub use cron::{CronCycle, CycleReport, RepositoryRun, find_next, is_eligible};
pub use error::{SchedulerError, SchedulerResult};
pub use processor::{PullOutcome, PullReport, PullRequestProcessor};
pub use report::TestReport;
