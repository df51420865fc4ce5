//! # contract: the seams between the engine and the outside world
//!
//! The engine never talks to GitHub, git, a terminal or an editor directly.
//! It goes through the traits below, which the CLI crate implements for real
//! use and which tests replace with `mockall` mocks.
//!
//! - [`ItemSource`]: where the contributor and their work items come from.
//! - [`Git`]: the handful of git operations the sync driver needs.
//! - [`Editor`]: hands a file to a human and waits until they are done.
//! - [`Prompter`]: yes/no questions and free-text answers.
//!
//! Adapter errors cross the seam boxed (except git, whose output the driver
//! inspects) and are mapped to [`crate::error::DailyStatusError`] by the caller.

use std::path::Path;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::BoxError;
use crate::git::{GitError, GitOutput};
use crate::item::{Contributor, WorkItem};

/// Search strings for one run, already combined with the shared extra query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub prs: String,
    pub issues: String,
    pub gists: String,
}

/// Source of the contributor and their open work.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// The authenticated user.
    async fn current_user(&self) -> Result<Contributor, BoxError>;

    /// Issues or pull requests matching a search query.
    async fn search_items(&self, query: &str) -> Result<Vec<WorkItem>, BoxError>;

    /// The user's gists. Sources that cannot filter gists may ignore `query`.
    async fn gists(&self, query: &str) -> Result<Vec<WorkItem>, BoxError>;
}

/// Git operations on the working copy that holds the status page.
///
/// Every failing command returns a [`GitError`] carrying its full output, so
/// the driver can tell a rebase conflict from anything else.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Git: Send + Sync {
    async fn add_all(&self) -> Result<GitOutput, GitError>;

    async fn commit(&self, message: &str, allow_empty: bool) -> Result<GitOutput, GitError>;

    async fn current_branch(&self) -> Result<String, GitError>;

    async fn pull_rebase(&self, remote: &str, branch: &str) -> Result<GitOutput, GitError>;

    /// Output of `git diff --check`, returned even when git exits non-zero.
    async fn diff_check(&self) -> Result<String, GitError>;

    /// Paths git currently reports as unmerged.
    async fn unmerged_paths(&self) -> Result<Vec<String>, GitError>;

    async fn checkout_theirs(&self, paths: &[String]) -> Result<GitOutput, GitError>;

    async fn rebase_continue(&self) -> Result<GitOutput, GitError>;

    async fn rebase_skip(&self) -> Result<GitOutput, GitError>;

    /// Returns the branch to where it was before the pull.
    async fn rebase_abort(&self) -> Result<GitOutput, GitError>;

    async fn push(&self, remote: &str, branch: &str) -> Result<GitOutput, GitError>;
}

/// Opens a file for a human to edit and resolves once they close it.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Editor: Send + Sync {
    async fn edit(&self, path: &Path) -> Result<(), BoxError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Prompter: Send + Sync {
    fn confirm(&self, question: &str) -> Result<bool, BoxError>;

    fn ask(&self, question: &str) -> Result<String, BoxError>;
}
