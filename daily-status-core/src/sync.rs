//! Publishing the page: stage, commit, pull with rebase, recover from
//! conflicts, push.
//!
//! The driver is a small state machine over the [`Git`] seam:
//!
//! ```text
//! Idle -> Staged -> Committed -> Pulling -> Pushed
//!                                   |  ^
//!                                   v  |
//!                              Conflicted -> Resolved
//! ```
//!
//! Any git failure that is not a rebase conflict ends in `Fatal` and is
//! returned unchanged. When resolving a conflict fails, the rebase is aborted
//! before the error is returned. The number of pulls is bounded by
//! [`SyncConfig::max_attempts`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::contract::{Editor, Git};
use crate::error::{DailyStatusError, Result};
use crate::git::GitError;

/// Substrings in git output that mark a rebase stopped on conflicts.
pub const CONFLICT_MARKERS: [&str; 2] = ["Resolve all conflicts manually", "CONFLICT ("];

pub const NOTHING_TO_COMMIT: &str = "nothing to commit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Idle,
    Staged,
    Committed,
    Pulling,
    Conflicted,
    Resolved,
    Pushed,
    Fatal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Open every conflicted file in the editor until none is left.
    #[default]
    Interactive,
    /// Keep the side of the commit being replayed (`git checkout --theirs`
    /// during a rebase) for every conflicted file.
    AcceptTheirs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub remote: String,
    pub conflict_policy: ConflictPolicy,
    pub max_attempts: u32,
    pub commit_message: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            conflict_policy: ConflictPolicy::Interactive,
            max_attempts: 3,
            commit_message: "Update".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub branch: String,
    /// Number of `pull --rebase` runs.
    pub attempts: u32,
    pub resolved_paths: Vec<String>,
    pub states: Vec<SyncState>,
}

pub fn is_conflict(err: &GitError) -> bool {
    CONFLICT_MARKERS.iter().any(|m| err.output_contains(m))
}

/// Paths flagged by `git diff --check` as still holding conflict markers,
/// in order of first appearance.
pub fn parse_conflicted_paths(diff_check: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for line in diff_check.lines().filter(|l| l.contains("leftover conflict")) {
        let path = line.split(':').next().unwrap_or(line).trim();
        if !path.is_empty() && !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }
    paths
}

pub struct SyncDriver<'a, G: Git + ?Sized, E: Editor + ?Sized> {
    git: &'a G,
    editor: &'a E,
    repo_dir: PathBuf,
    config: &'a SyncConfig,
    report: SyncReport,
}

impl<'a, G: Git + ?Sized, E: Editor + ?Sized> SyncDriver<'a, G, E> {
    pub fn new(git: &'a G, editor: &'a E, repo_dir: &Path, config: &'a SyncConfig) -> Self {
        Self {
            git,
            editor,
            repo_dir: repo_dir.to_path_buf(),
            config,
            report: SyncReport {
                states: vec![SyncState::Idle],
                ..Default::default()
            },
        }
    }

    fn enter(&mut self, state: SyncState) {
        info!(?state, attempt = self.report.attempts, "[SYNC] state");
        self.report.states.push(state);
    }

    fn fatal(&mut self, err: GitError) -> DailyStatusError {
        warn!(error = %err, "[SYNC] giving up");
        self.enter(SyncState::Fatal);
        DailyStatusError::SyncFatal(err)
    }

    /// Runs the whole protocol and reports how it went.
    pub async fn run(mut self) -> Result<SyncReport> {
        if let Err(e) = self.git.add_all().await {
            return Err(self.fatal(e));
        }
        self.enter(SyncState::Staged);

        let committed = self.git.commit(&self.config.commit_message, true).await;
        if let Err(e) = committed {
            return Err(self.fatal(e));
        }
        self.enter(SyncState::Committed);

        let branch = match self.git.current_branch().await {
            Ok(branch) => branch,
            Err(e) => return Err(self.fatal(e)),
        };
        self.report.branch = branch.clone();

        loop {
            if self.report.attempts >= self.config.max_attempts {
                warn!(attempts = self.report.attempts, "[SYNC] retries exhausted");
                self.enter(SyncState::Fatal);
                return Err(DailyStatusError::RetriesExhausted {
                    attempts: self.report.attempts,
                });
            }
            self.report.attempts += 1;
            self.enter(SyncState::Pulling);

            let pulled = self.git.pull_rebase(&self.config.remote, &branch).await;
            match pulled {
                Ok(_) => break,
                Err(e) if is_conflict(&e) => {
                    self.enter(SyncState::Conflicted);
                    if let Err(err) = self.resolve().await {
                        self.abort_rebase().await;
                        return Err(err);
                    }
                    self.enter(SyncState::Resolved);
                }
                Err(e) => return Err(self.fatal(e)),
            }
        }

        let pushed = self.git.push(&self.config.remote, &branch).await;
        if let Err(e) = pushed {
            return Err(self.fatal(e));
        }
        self.enter(SyncState::Pushed);
        Ok(self.report)
    }

    /// Leaves the working copy as it was before the pull so a later run can
    /// start over. The error that ended resolution is what gets reported.
    async fn abort_rebase(&self) {
        match self.git.rebase_abort().await {
            Ok(_) => info!("[SYNC] rebase aborted"),
            Err(e) => warn!(error = %e, "[SYNC] could not abort the rebase"),
        }
    }

    /// Resolves the current rebase stop and continues the rebase until it
    /// finishes. A rebase that stops again on the next commit is resolved in
    /// another round, bounded by `max_attempts`.
    async fn resolve(&mut self) -> Result<()> {
        for round in 1..=self.config.max_attempts.max(1) {
            debug!(round, policy = ?self.config.conflict_policy, "[SYNC] resolving conflicts");
            match self.config.conflict_policy {
                ConflictPolicy::Interactive => self.edit_until_clean().await?,
                ConflictPolicy::AcceptTheirs => self.accept_theirs().await?,
            }

            if let Err(e) = self.git.add_all().await {
                return Err(self.fatal(e));
            }
            let continued = self.git.rebase_continue().await;
            let continued = match continued {
                Err(e) if e.output_contains(NOTHING_TO_COMMIT) => {
                    debug!("[SYNC] resolved commit is empty, skipping it");
                    self.git.rebase_skip().await
                }
                other => other,
            };
            match continued {
                Ok(_) => return Ok(()),
                Err(e) if is_conflict(&e) => {
                    info!(round, "[SYNC] rebase stopped on another conflict");
                }
                Err(e) => return Err(self.fatal(e)),
            }
        }
        warn!("[SYNC] conflicts kept coming back");
        self.enter(SyncState::Fatal);
        Err(DailyStatusError::RetriesExhausted {
            attempts: self.report.attempts,
        })
    }

    async fn edit_until_clean(&mut self) -> Result<()> {
        for _ in 0..self.config.max_attempts.max(1) {
            let check = match self.git.diff_check().await {
                Ok(out) => out,
                Err(e) => return Err(self.fatal(e)),
            };
            let conflicted = parse_conflicted_paths(&check);
            if conflicted.is_empty() {
                return Ok(());
            }
            for path in &conflicted {
                let full = self.repo_dir.join(path);
                info!(path = %path, "[SYNC] opening conflicted file in editor");
                self.editor
                    .edit(&full)
                    .await
                    .map_err(|source| DailyStatusError::Editor { path: full.clone(), source })?;
                if !self.report.resolved_paths.contains(path) {
                    self.report.resolved_paths.push(path.clone());
                }
            }
        }
        let check = match self.git.diff_check().await {
            Ok(out) => out,
            Err(e) => return Err(self.fatal(e)),
        };
        if parse_conflicted_paths(&check).is_empty() {
            Ok(())
        } else {
            warn!("[SYNC] conflict markers still present after editing");
            self.enter(SyncState::Fatal);
            Err(DailyStatusError::RetriesExhausted {
                attempts: self.report.attempts,
            })
        }
    }

    async fn accept_theirs(&mut self) -> Result<()> {
        let paths = match self.git.unmerged_paths().await {
            Ok(paths) => paths,
            Err(e) => return Err(self.fatal(e)),
        };
        if paths.is_empty() {
            return Ok(());
        }
        info!(paths = ?paths, "[SYNC] keeping the replayed side");
        if let Err(e) = self.git.checkout_theirs(&paths).await {
            return Err(self.fatal(e));
        }
        for path in paths {
            if !self.report.resolved_paths.contains(&path) {
                self.report.resolved_paths.push(path);
            }
        }
        Ok(())
    }
}
