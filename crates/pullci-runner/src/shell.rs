//! Local shell runner implementation.

use async_trait::async_trait;
use chrono::Utc;
use pullci_core::runner::{TestPlan, TestResult, TestRunner};
use pullci_core::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Runs each test command through `/bin/sh -c` inside the staging directory.
///
/// All commands are launched before any is awaited, so they run
/// concurrently. Standard output of command `i` goes to `test-{i}.out` in
/// the working directory; standard error is inherited from the server.
#[derive(Debug, Clone)]
pub struct LocalShellRunner {
    shell: PathBuf,
}

impl LocalShellRunner {
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
        }
    }

    /// Use a different POSIX shell.
    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn output_path(working_dir: &Path, index: usize) -> PathBuf {
        working_dir.join(format!("test-{}.out", index))
    }

    fn launch(&self, working_dir: &Path, index: usize, command: &str) -> Result<(Child, PathBuf)> {
        let output_path = Self::output_path(working_dir, index);
        let spawn_error = |source| Error::Spawn {
            index,
            command: command.to_string(),
            source,
        };

        let stdout = File::create(&output_path).map_err(spawn_error)?;
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_error)?;

        Ok((child, output_path))
    }
}

impl Default for LocalShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for(index: usize, mut child: Child, output_path: PathBuf) -> Result<TestResult> {
    let status = child.wait().await.map_err(|e| {
        Error::Runner(format!("failed waiting for test {}: {}", index, e))
    })?;
    let end = Utc::now();

    // No exit code means the process was killed by a signal.
    let code = status.code().unwrap_or(-1);
    debug!(index, code, "Test command exited");

    Ok(TestResult {
        index,
        end,
        code,
        output_path,
    })
}

#[async_trait]
impl TestRunner for LocalShellRunner {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn run(&self, plan: &TestPlan) -> Result<Vec<TestResult>> {
        if let Some(timeout) = plan.timeout {
            debug!(?timeout, "Suite timeout is configured but not enforced");
        }
        info!(
            working_dir = %plan.working_dir.display(),
            commands = plan.commands.len(),
            "Launching test commands"
        );

        let mut waits = JoinSet::new();
        let mut launch_error = None;

        for (index, command) in plan.commands.iter().enumerate() {
            match self.launch(&plan.working_dir, index, command) {
                Ok((child, output_path)) => {
                    debug!(index, command = %command, "Launched test command");
                    waits.spawn(wait_for(index, child, output_path));
                }
                Err(e) => {
                    warn!(index, command = %command, error = %e, "Failed to launch test command");
                    launch_error = Some(e);
                    break;
                }
            }
        }

        let mut results = Vec::with_capacity(plan.commands.len());
        let mut wait_error = None;
        while let Some(joined) = waits.join_next().await {
            match joined {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => {
                    wait_error.get_or_insert(e);
                }
                Err(e) => {
                    wait_error.get_or_insert(Error::Runner(format!("wait task failed: {}", e)));
                }
            }
        }

        // Commands already launched are always reaped before reporting.
        if let Some(e) = launch_error.or(wait_error) {
            return Err(e);
        }

        results.sort_by_key(|r| r.index);
        Ok(results)
    }
}
