//! Git checkout of pull request heads into a staging directory.

use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum GitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// Local branch a pull request is checked out on.
pub fn branch_name(number: u64) -> String {
    format!("pullci-{}", number)
}

/// Fetch `pull/<number>/head` from `remote_url` and force-check it out in `dir`.
///
/// The directory is initialized as a repository on first use. Untracked
/// files such as copied static data are left in place.
pub async fn checkout_pull(
    dir: &Path,
    remote_url: &str,
    number: u64,
    access_token: Option<&str>,
) -> Result<(), GitError> {
    if !dir.join(".git").exists() {
        info!(path = %dir.display(), "Initializing staging repository");
        run_git(dir, &["init", "--quiet"], None).await?;
    }

    let auth_url = authenticated_url(remote_url, access_token);
    let refspec = format!("pull/{}/head", number);
    debug!(remote = %remote_url, refspec = %refspec, "Fetching pull request head");
    run_git(dir, &["fetch", "--quiet", &auth_url, &refspec], access_token).await?;

    let branch = branch_name(number);
    run_git(dir, &["checkout", "--quiet", "-f", "-B", &branch, "FETCH_HEAD"], None).await?;

    info!(path = %dir.display(), branch = %branch, "Checked out pull request");
    Ok(())
}

// https://github.com/owner/repo.git -> https://token@github.com/owner/repo.git
fn authenticated_url(url: &str, access_token: Option<&str>) -> String {
    match (access_token, url.strip_prefix("https://")) {
        (Some(token), Some(rest)) => format!("https://{}@{}", token, rest),
        _ => url.to_string(),
    }
}

async fn run_git(dir: &Path, args: &[&str], secret: Option<&str>) -> Result<(), GitError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if output.status.success() {
        return Ok(());
    }

    let redact = |s: &str| match secret {
        Some(token) if !token.is_empty() => s.replace(token, "[REDACTED]"),
        _ => s.to_string(),
    };
    let command = redact(&args.join(" "));
    let stderr = redact(String::from_utf8_lossy(&output.stderr).trim());
    // The arguments may carry the token; only the redacted form is logged.
    warn!(command = %command, "Git command failed");
    Err(GitError::CommandFailed { command, stderr })
}
