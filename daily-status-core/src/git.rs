use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::contract::Git;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A git command that could not be launched or exited non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitError {
    pub command: String,
    /// Exit code; `None` when the process could not be started or was killed.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitError {
    pub fn new(command: impl Into<String>, status: Option<i32>, stdout: &str, stderr: &str) -> Self {
        Self {
            command: command.into(),
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    pub fn output_contains(&self, needle: &str) -> bool {
        self.stdout.contains(needle) || self.stderr.contains(needle)
    }
}

impl fmt::Display for GitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "`git {}` exited with code {code}", self.command)?,
            None => write!(f, "`git {}` did not run to completion", self.command)?,
        }
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        if !detail.is_empty() {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GitError {}

/// [`Git`] backed by the `git` executable, run inside `repo_dir`.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    async fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<GitOutput, GitError> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let command = args.join(" ");
        tracing::debug!(command = %command, dir = %self.repo_dir.display(), "Running git");

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.repo_dir)
            // rebase --continue must not wait on an editor
            .env("GIT_EDITOR", "true")
            .output()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, command = %command, "Failed to launch git process");
                GitError::new(&command, None, "", &e.to_string())
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            tracing::debug!(command = %command, stdout = %stdout.trim(), "git succeeded");
            Ok(GitOutput { stdout, stderr })
        } else {
            tracing::debug!(
                command = %command,
                status = ?output.status.code(),
                stdout = %stdout.trim(),
                stderr = %stderr.trim(),
                "git failed"
            );
            Err(GitError::new(command, output.status.code(), &stdout, &stderr))
        }
    }
}

#[async_trait]
impl Git for GitCli {
    async fn add_all(&self) -> Result<GitOutput, GitError> {
        self.run(&["add", "."]).await
    }

    async fn commit(&self, message: &str, allow_empty: bool) -> Result<GitOutput, GitError> {
        let mut args = vec!["commit", "-m", message];
        if allow_empty {
            args.push("--allow-empty");
        }
        self.run(args.as_slice()).await
    }

    async fn current_branch(&self) -> Result<String, GitError> {
        let out = self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(out.stdout.trim().to_string())
    }

    async fn pull_rebase(&self, remote: &str, branch: &str) -> Result<GitOutput, GitError> {
        self.run(&["pull", "--rebase", remote, branch]).await
    }

    async fn diff_check(&self) -> Result<String, GitError> {
        match self.run(&["diff", "--check"]).await {
            Ok(out) => Ok(out.stdout),
            // --check exits non-zero exactly when it has something to report
            Err(e) if e.status.is_some() => Ok(e.stdout),
            Err(e) => Err(e),
        }
    }

    async fn unmerged_paths(&self) -> Result<Vec<String>, GitError> {
        let out = self
            .run(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn checkout_theirs(&self, paths: &[String]) -> Result<GitOutput, GitError> {
        let mut args = vec!["checkout".to_string(), "--theirs".to_string(), "--".to_string()];
        args.extend(paths.iter().cloned());
        self.run(args.as_slice()).await
    }

    async fn rebase_continue(&self) -> Result<GitOutput, GitError> {
        self.run(&["rebase", "--continue"]).await
    }

    async fn rebase_skip(&self) -> Result<GitOutput, GitError> {
        self.run(&["rebase", "--skip"]).await
    }

    async fn rebase_abort(&self) -> Result<GitOutput, GitError> {
        self.run(&["rebase", "--abort"]).await
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<GitOutput, GitError> {
        self.run(&["push", remote, branch]).await
    }
}
