//! Pull request processor - takes each open pull request of a repository
//! through staging, testing, finalization, archival and notification.
//!
//! The ledger is saved twice per pull request: once with an in-progress
//! record before any test is launched, and once after every test exited.
//! A crash in between leaves a record that the next cycle retries.

use crate::report::TestReport;
use crate::{CiContext, SchedulerError, SchedulerResult};
use chrono::Utc;
use pullci_core::notify::{Notification, RepoFields};
use pullci_core::runner::TestPlan;
use pullci_core::source::{CommitState, CommitStatus, OpenPullRequest};
use pullci_core::summary::TestSummary;
use pullci_core::{ArchiveLedger, Error, PullRequestRecord, Repository, Result};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// How one pull request ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    Succeeded { percent: f64, degraded: bool },
    Failed { percent: f64 },
    /// Processing stopped early; the ledger record was left for a retry.
    Errored { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullReport {
    pub number: u64,
    pub outcome: PullOutcome,
}

/// Processes the open pull requests of a single repository, one at a time.
pub struct PullRequestProcessor<'a> {
    ctx: &'a CiContext,
    repo: &'a Repository,
}

impl<'a> PullRequestProcessor<'a> {
    pub fn new(ctx: &'a CiContext, repo: &'a Repository) -> Self {
        Self { ctx, repo }
    }

    /// Open pull requests that are not yet completed in the ledger.
    pub async fn discover(&self, ledger: &ArchiveLedger) -> Result<Vec<OpenPullRequest>> {
        let open = self.ctx.source.list_open_pull_requests(self.repo).await?;
        let total = open.len();

        let pending: Vec<_> = open
            .into_iter()
            .filter(|pull| !ledger.is_completed(&self.repo.key, pull.number))
            .collect();

        debug!(
            repo = %self.repo.key,
            open = total,
            pending = pending.len(),
            "Discovered pull requests"
        );
        Ok(pending)
    }

    /// Drain every pending pull request.
    ///
    /// A failing pull request is reported and skipped. Only a failure to
    /// read or write the ledger stops the loop.
    pub async fn run(&self) -> SchedulerResult<Vec<PullReport>> {
        let mut ledger = self.ctx.archive.load()?;
        if ledger.install(&self.repo.key) {
            debug!(repo = %self.repo.key, "Created ledger entry");
        }

        let pulls = self.discover(&ledger).await?;
        let mut reports = Vec::with_capacity(pulls.len());

        for pull in &pulls {
            let outcome = match self.process(&mut ledger, pull).await {
                Ok(outcome) => outcome,
                Err(SchedulerError::Processing(e)) => self.fail(pull, &e).await,
                Err(fatal) => return Err(fatal),
            };
            reports.push(PullReport {
                number: pull.number,
                outcome,
            });
        }

        Ok(reports)
    }

    async fn process(
        &self,
        ledger: &mut ArchiveLedger,
        pull: &OpenPullRequest,
    ) -> SchedulerResult<PullOutcome> {
        let key = &self.repo.key;
        info!(repo = %key, pull = pull.number, title = %pull.title, "Processing pull request");

        let prior_stage = ledger.get(key, pull.number).map(|record| {
            info!(
                repo = %key,
                pull = pull.number,
                started = %record.start,
                "Retrying interrupted pull request"
            );
            record.stage.clone()
        });
        self.stage(prior_stage, pull).await?;

        ledger.record(
            key,
            PullRequestRecord::begin(pull.number, &self.repo.staging, Utc::now()),
        );
        self.ctx.archive.save(ledger)?;

        let commands = self.commands(pull.number);
        self.ctx
            .source
            .set_commit_status(
                self.repo,
                &pull.head,
                &CommitStatus::new(CommitState::Pending, "Running unit tests...")
                    .with_details_url(pull.html_url.clone()),
            )
            .await?;
        self.notify(Notification::Start {
            repo: RepoFields::from_repository(self.repo),
            pull: pull.number,
            tests: TestSummary::planned(&commands),
        })
        .await;

        let plan = TestPlan::new(&self.repo.staging, commands.clone())
            .with_timeout_minutes(self.repo.testing.timeout_minutes);
        let launched = Utc::now();
        let results = self.ctx.runner.run(&plan).await?;
        let report = TestReport::reconcile(&commands, launched, results)?;

        info!(
            repo = %key,
            pull = pull.number,
            percent = report.percent,
            degraded = report.degraded,
            seconds = report.total_seconds,
            "Tests finished"
        );

        self.ctx
            .source
            .set_commit_status(
                self.repo,
                &pull.head,
                &report.commit_status(pull.html_url.clone()),
            )
            .await?;

        let success = report.is_success();
        if let Some(record) = ledger.get_mut(key, pull.number) {
            record.finalize(success, Utc::now());
        }
        self.ctx.archive.save(ledger)?;

        let repo = RepoFields::from_repository(self.repo);
        let tests = TestSummary::finished(&report.outcomes);
        let results = report.run_results();
        let (notification, outcome) = if success {
            (
                Notification::Success {
                    repo,
                    pull: pull.number,
                    tests,
                    results,
                },
                PullOutcome::Succeeded {
                    percent: report.percent,
                    degraded: report.degraded,
                },
            )
        } else {
            (
                Notification::Failure {
                    repo,
                    pull: pull.number,
                    tests,
                    results,
                },
                PullOutcome::Failed {
                    percent: report.percent,
                },
            )
        };
        self.notify(notification).await;

        Ok(outcome)
    }

    /// Prepare the staging directory and check the pull request out into it.
    async fn stage(&self, prior_stage: Option<PathBuf>, pull: &OpenPullRequest) -> Result<()> {
        let dir = self.repo.staging.clone();
        let statics = self.repo.statics.clone();

        tokio::task::spawn_blocking(move || {
            crate::staging::prepare(&dir, prior_stage.as_deref(), &statics)
        })
        .await
        .map_err(|e| Error::Internal(format!("staging task failed: {}", e)))??;

        self.ctx
            .source
            .checkout(self.repo, pull, &self.repo.staging)
            .await
    }

    /// Report a failed pull request. The ledger is not touched.
    async fn fail(&self, pull: &OpenPullRequest, err: &Error) -> PullOutcome {
        let message = err.to_string();
        error!(
            repo = %self.repo.key,
            pull = pull.number,
            error = %message,
            "Pull request processing failed"
        );

        let status = CommitStatus::new(
            CommitState::Error,
            format!("Uncaught exception in CI server: {}", message),
        )
        .with_details_url(pull.html_url.clone());
        if let Err(e) = self
            .ctx
            .source
            .set_commit_status(self.repo, &pull.head, &status)
            .await
        {
            warn!(repo = %self.repo.key, pull = pull.number, error = %e, "Failed to post error status");
        }

        self.notify(Notification::Error {
            repo: RepoFields::from_repository(self.repo),
            pull: pull.number,
            tests: TestSummary::planned(&self.commands(pull.number)),
            message: message.clone(),
        })
        .await;

        PullOutcome::Errored { message }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.ctx.notifier.notify(self.repo, &notification).await {
            warn!(
                repo = %self.repo.key,
                pull = notification.pull(),
                event = %notification.kind(),
                error = %e,
                "Notification delivery failed"
            );
        }
    }

    fn commands(&self, number: u64) -> Vec<String> {
        self.ctx
            .vars
            .for_pull(self.repo, number)
            .interpolate_vec(&self.repo.testing.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockNotifier, MockRunner, MockSource, context, repository};
    use chrono::{Duration, TimeZone};
    use pullci_archive::ArchiveStore;
    use pullci_config::VariableContextBuilder;
    use pullci_core::repository::{StaticCopy, StaticKind};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn record_done(number: u64, stage: &std::path::Path) -> PullRequestRecord {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut record = PullRequestRecord::begin(number, stage, start);
        record.finalize(true, start + Duration::minutes(1));
        record
    }

    #[tokio::test]
    async fn test_completed_pull_requests_are_skipped() {
        let dir = tempdir().unwrap();
        let stage = dir.path().join("stage");
        let repo = repository("Acme/Widget", &stage, &["make"]);

        let mut ledger = ArchiveLedger::new();
        ledger.record(&repo.key, record_done(1, &stage));
        ArchiveStore::new(dir.path().join("archive.json"))
            .save(&ledger)
            .unwrap();

        let source = Arc::new(MockSource::with_pulls(&[1, 2]));
        let runner = Arc::new(MockRunner::with_codes(&[0]));
        let notifier = Arc::new(MockNotifier::default());
        let ctx = context(dir.path(), vec![repo.clone()], source, runner.clone(), notifier);
        let processor = PullRequestProcessor::new(&ctx, &repo);

        let reports = processor.run().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].number, 2);

        // Everything is completed now, so a second pass does nothing.
        let reports = processor.run().await.unwrap();
        assert!(reports.is_empty());
        assert_eq!(runner.plans.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_is_archived_unsuccessful() {
        let dir = tempdir().unwrap();
        let repo = repository("acme/widget", &dir.path().join("stage"), &["a", "b", "c"]);

        let source = Arc::new(MockSource::with_pulls(&[5]));
        let notifier = Arc::new(MockNotifier::default());
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            source.clone(),
            Arc::new(MockRunner::with_codes(&[0, 1, -1])),
            notifier.clone(),
        );

        let reports = PullRequestProcessor::new(&ctx, &repo).run().await.unwrap();
        match &reports[0].outcome {
            PullOutcome::Failed { percent } => assert!((percent - 2.0 / 3.0).abs() < 1e-12),
            other => panic!("Expected Failed, got {:?}", other),
        }

        let record = ctx.archive.load().unwrap().get(&repo.key, 5).cloned().unwrap();
        assert!(record.completed);
        assert!(!record.success);

        let statuses = source.statuses_for(5);
        assert_eq!(statuses[0].state, CommitState::Pending);
        assert_eq!(statuses[0].description, "Running unit tests...");
        assert_eq!(statuses[1].state, CommitState::Failure);
        assert!(statuses[1].description.starts_with("Results: 66.67% in "));

        assert_eq!(
            notifier.kinds(),
            vec![(5, "start".to_string()), (5, "failure".to_string())]
        );
        let events = notifier.events.lock().unwrap();
        assert_eq!(events[1].fields()["percent"], "66.67%");
    }

    #[tokio::test]
    async fn test_degraded_run_reports_slowdown() {
        let dir = tempdir().unwrap();
        let repo = repository("acme/widget", &dir.path().join("stage"), &["a", "b", "c"]);

        let source = Arc::new(MockSource::with_pulls(&[6]));
        let notifier = Arc::new(MockNotifier::default());
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            source.clone(),
            Arc::new(MockRunner::with_codes(&[0, 0, 1])),
            notifier.clone(),
        );

        let reports = PullRequestProcessor::new(&ctx, &repo).run().await.unwrap();
        assert_eq!(
            reports[0].outcome,
            PullOutcome::Succeeded {
                percent: 1.0,
                degraded: true
            }
        );

        let record = ctx.archive.load().unwrap().get(&repo.key, 6).cloned().unwrap();
        assert!(record.success);

        let last = source.statuses_for(6).pop().unwrap();
        assert_eq!(last.state, CommitState::Pending);
        assert!(last.description.ends_with("Slowdown reported."));

        let events = notifier.events.lock().unwrap();
        match &events[1] {
            Notification::Success { results, .. } => {
                assert!(results.degraded);
                assert!(results.status.contains("Slowdown"));
            }
            other => panic!("Expected Success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_interrupted_attempt_is_retried_in_new_stage() {
        let dir = tempdir().unwrap();
        let old_stage = dir.path().join("A");
        let new_stage = dir.path().join("B");
        std::fs::create_dir_all(&old_stage).unwrap();
        std::fs::write(old_stage.join("partial.o"), "x").unwrap();

        let repo = repository("acme/widget", &new_stage, &["make"]);
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut ledger = ArchiveLedger::new();
        ledger.record(&repo.key, PullRequestRecord::begin(8, &old_stage, start));
        ArchiveStore::new(dir.path().join("archive.json"))
            .save(&ledger)
            .unwrap();

        let source = Arc::new(MockSource::with_pulls(&[8]));
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            source.clone(),
            Arc::new(MockRunner::with_codes(&[0])),
            Arc::new(MockNotifier::default()),
        );

        let reports = PullRequestProcessor::new(&ctx, &repo).run().await.unwrap();
        assert_eq!(reports.len(), 1);

        assert!(!old_stage.exists());
        assert!(new_stage.is_dir());
        assert_eq!(*source.checkouts.lock().unwrap(), vec![(8, new_stage.clone())]);

        let record = ctx.archive.load().unwrap().get(&repo.key, 8).cloned().unwrap();
        assert_eq!(record.stage, new_stage);
        assert!(record.completed);
    }

    #[tokio::test]
    async fn test_in_progress_record_is_saved_before_tests_run() {
        let dir = tempdir().unwrap();
        let repo = repository("acme/widget", &dir.path().join("stage"), &["make"]);
        let archive = ArchiveStore::new(dir.path().join("archive.json"));

        let runner = Arc::new(MockRunner::with_codes(&[0]).observing(archive.clone()));
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            Arc::new(MockSource::with_pulls(&[3])),
            runner.clone(),
            Arc::new(MockNotifier::default()),
        );

        PullRequestProcessor::new(&ctx, &repo).run().await.unwrap();

        let snapshots = runner.snapshots.lock().unwrap();
        let during = snapshots[0].get(&repo.key, 3).unwrap();
        assert!(!during.completed);
        assert!(during.finished.is_none());

        let after = archive.load().unwrap().get(&repo.key, 3).cloned().unwrap();
        assert!(after.completed);
        assert_eq!(after.start, during.start);
        assert!(after.start < after.finished.unwrap());
    }

    #[tokio::test]
    async fn test_one_failing_pull_request_does_not_stop_the_rest() {
        let dir = tempdir().unwrap();
        let repo = repository("acme/widget", &dir.path().join("stage"), &["make"]);

        let mut source = MockSource::with_pulls(&[1, 2]);
        source.fail_checkout.insert(1);
        let source = Arc::new(source);
        let notifier = Arc::new(MockNotifier::default());
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            source.clone(),
            Arc::new(MockRunner::with_codes(&[0])),
            notifier.clone(),
        );

        let reports = PullRequestProcessor::new(&ctx, &repo).run().await.unwrap();
        assert!(matches!(reports[0].outcome, PullOutcome::Errored { .. }));
        assert!(matches!(reports[1].outcome, PullOutcome::Succeeded { .. }));

        let ledger = ctx.archive.load().unwrap();
        assert!(ledger.get(&repo.key, 1).is_none());
        assert!(ledger.is_completed(&repo.key, 2));

        let errored = source.statuses_for(1);
        assert_eq!(errored.len(), 1);
        assert_eq!(errored[0].state, CommitState::Error);
        assert!(errored[0]
            .description
            .starts_with("Uncaught exception in CI server: "));

        assert_eq!(
            notifier.kinds(),
            vec![
                (1, "error".to_string()),
                (2, "start".to_string()),
                (2, "success".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_launch_failure_leaves_record_for_retry() {
        let dir = tempdir().unwrap();
        let repo = repository("acme/widget", &dir.path().join("stage"), &["make ${pull.number}"]);

        let source = Arc::new(MockSource::with_pulls(&[1, 2]));
        let notifier = Arc::new(MockNotifier::default());
        let runner = Arc::new(MockRunner::with_codes(&[0]).fail_for("make 1"));
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            source.clone(),
            runner.clone(),
            notifier.clone(),
        );
        let processor = PullRequestProcessor::new(&ctx, &repo);

        let reports = processor.run().await.unwrap();
        match &reports[0].outcome {
            PullOutcome::Errored { message } => assert!(message.contains("make 1")),
            other => panic!("Expected Errored, got {:?}", other),
        }
        assert!(matches!(reports[1].outcome, PullOutcome::Succeeded { .. }));

        let ledger = ctx.archive.load().unwrap();
        let record = ledger.get(&repo.key, 1).unwrap();
        assert!(!record.completed);
        assert!(record.finished.is_none());
        assert!(ledger.is_completed(&repo.key, 2));

        let states: Vec<_> = source.statuses_for(1).iter().map(|s| s.state).collect();
        assert_eq!(states, vec![CommitState::Pending, CommitState::Error]);
        assert_eq!(
            notifier.kinds(),
            vec![
                (1, "start".to_string()),
                (1, "error".to_string()),
                (2, "start".to_string()),
                (2, "success".to_string()),
            ]
        );

        // The next pass picks the unfinished pull request up again.
        let reports = processor.run().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].number, 1);
        assert!(matches!(reports[0].outcome, PullOutcome::Succeeded { .. }));
        assert!(ctx.archive.load().unwrap().is_completed(&repo.key, 1));
        assert_eq!(runner.plans.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_static_source_is_a_staging_error() {
        let dir = tempdir().unwrap();
        let stage = dir.path().join("stage");
        let data = dir.path().join("big.dat");
        let mut repo = repository("acme/widget", &stage, &["make"]);
        repo.statics = vec![StaticCopy {
            kind: StaticKind::File,
            source: data.clone(),
            target: "./tests/big.dat".into(),
        }];

        let source = Arc::new(MockSource::with_pulls(&[7]));
        let runner = Arc::new(MockRunner::with_codes(&[0]));
        let notifier = Arc::new(MockNotifier::default());
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            source.clone(),
            runner.clone(),
            notifier.clone(),
        );
        let processor = PullRequestProcessor::new(&ctx, &repo);

        let reports = processor.run().await.unwrap();
        match &reports[0].outcome {
            PullOutcome::Errored { message } => assert!(message.starts_with("staging failed")),
            other => panic!("Expected Errored, got {:?}", other),
        }
        assert!(ctx.archive.load().unwrap().get(&repo.key, 7).is_none());
        assert!(source.checkouts.lock().unwrap().is_empty());
        assert!(runner.plans.lock().unwrap().is_empty());
        assert_eq!(source.statuses_for(7)[0].state, CommitState::Error);
        assert_eq!(notifier.kinds(), vec![(7, "error".to_string())]);

        std::fs::write(&data, "payload").unwrap();
        let reports = processor.run().await.unwrap();
        assert!(matches!(reports[0].outcome, PullOutcome::Succeeded { .. }));
        assert_eq!(
            std::fs::read_to_string(stage.join("tests/big.dat")).unwrap(),
            "payload"
        );
    }

    #[tokio::test]
    async fn test_failed_retry_leaves_record_untouched() {
        let dir = tempdir().unwrap();
        let stage = dir.path().join("stage");
        let repo = repository("acme/widget", &stage, &["make"]);

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let interrupted = PullRequestRecord::begin(4, &stage, start);
        let mut ledger = ArchiveLedger::new();
        ledger.record(&repo.key, interrupted.clone());
        ArchiveStore::new(dir.path().join("archive.json"))
            .save(&ledger)
            .unwrap();

        let mut source = MockSource::with_pulls(&[4]);
        source.fail_checkout.insert(4);
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            Arc::new(source),
            Arc::new(MockRunner::with_codes(&[0])),
            Arc::new(MockNotifier::default()),
        );

        PullRequestProcessor::new(&ctx, &repo).run().await.unwrap();

        assert_eq!(ctx.archive.load().unwrap().get(&repo.key, 4), Some(&interrupted));
    }

    #[tokio::test]
    async fn test_commands_are_interpolated_per_pull() {
        let dir = tempdir().unwrap();
        let repo = repository(
            "acme/widget",
            &dir.path().join("stage"),
            &["${SCRATCH}/run.sh ${pull.number}"],
        );

        let runner = Arc::new(MockRunner::with_codes(&[0]));
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            Arc::new(MockSource::with_pulls(&[12])),
            runner.clone(),
            Arc::new(MockNotifier::default()),
        )
        .with_vars(VariableContextBuilder::new().with_custom("SCRATCH", "/scratch").build());

        PullRequestProcessor::new(&ctx, &repo).run().await.unwrap();

        let plans = runner.plans.lock().unwrap();
        assert_eq!(plans[0].commands, vec!["/scratch/run.sh 12"]);
        assert_eq!(plans[0].working_dir, repo.staging);
    }

    #[tokio::test]
    async fn test_listing_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let repo = repository("acme/widget", &dir.path().join("stage"), &["make"]);
        let source = MockSource {
            fail_listing: true,
            ..Default::default()
        };
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            Arc::new(source),
            Arc::new(MockRunner::with_codes(&[0])),
            Arc::new(MockNotifier::default()),
        );

        let err = PullRequestProcessor::new(&ctx, &repo).run().await.unwrap_err();
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_archive_write_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let repo = repository("acme/widget", &dir.path().join("stage"), &["make"]);

        // An occupied directory where the archive file should be.
        let blocked = dir.path().join("archive.json");
        std::fs::create_dir_all(blocked.join("occupied")).unwrap();

        let notifier = Arc::new(MockNotifier::default());
        let ctx = context(
            dir.path(),
            vec![repo.clone()],
            Arc::new(MockSource::with_pulls(&[1, 2])),
            Arc::new(MockRunner::with_codes(&[0])),
            notifier.clone(),
        );

        let err = PullRequestProcessor::new(&ctx, &repo).run().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(notifier.events.lock().unwrap().is_empty());
    }
}
