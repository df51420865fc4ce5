//! The per-contributor draft, kept next to the repository's git metadata so it
//! is never staged with the status page.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::io::atomic_write;

pub const DRAFT_FILE_NAME: &str = "daily-status-message";

#[derive(Debug, Clone)]
pub struct DraftStore {
    path: PathBuf,
}

impl DraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `daily-status-message` inside the repository's git metadata directory.
    pub fn for_repo(repo_dir: &Path) -> Self {
        Self::new(git_metadata_dir(repo_dir).join(DRAFT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                debug!(path = %self.path.display(), "Loaded previous draft");
                Ok(Some(text))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, text: &str) -> Result<()> {
        atomic_write(&self.path, text.as_bytes())?;
        debug!(path = %self.path.display(), bytes = text.len(), "Saved draft");
        Ok(())
    }

    /// Removes the draft. Returns whether there was one.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Removed draft");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// The directory git keeps its metadata in for `repo_dir`.
///
/// `.git` is usually that directory. In worktrees and submodules it is a file
/// holding `gitdir: <path>`, relative to `repo_dir` unless absolute. Anything
/// else falls back to the system temp directory.
pub fn git_metadata_dir(repo_dir: &Path) -> PathBuf {
    let dot_git = repo_dir.join(".git");
    if dot_git.is_dir() {
        return dot_git;
    }
    let pointer = std::fs::read_to_string(&dot_git).ok().and_then(|text| {
        text.lines()
            .find_map(|line| line.strip_prefix("gitdir:"))
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
    });
    match pointer {
        Some(target) => repo_dir.join(target),
        None => {
            warn!(repo = %repo_dir.display(), "No git metadata directory, keeping the draft in the temp directory");
            std::env::temp_dir()
        }
    }
}
