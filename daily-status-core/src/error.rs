use std::path::PathBuf;

use thiserror::Error;

use crate::git::GitError;

/// Boxed error returned by adapters at the trait seams (item source, editor, prompt).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum DailyStatusError {
    #[error("malformed region '{key}': {reason}")]
    MalformedRegion { key: String, reason: String },

    #[error("nothing to merge for {login}: the edited status is empty")]
    EmptyMarkup { login: String },

    #[error("invalid template {0}")]
    UnknownTemplateSlot(String),

    #[error("invalid configuration for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("{} must be a git repository", .0.display())]
    NotAGitRepository(PathBuf),

    #[error("{} must exist", .0.display())]
    MissingFile(PathBuf),

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("failed to load {what}: {source}")]
    Source {
        what: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("editor failed on {}: {source}", path.display())]
    Editor {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("prompt failed: {0}")]
    Prompt(#[source] BoxError),

    #[error("synchronisation failed: {0}")]
    SyncFatal(#[from] GitError),

    #[error("synchronisation gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DailyStatusError {
    pub(crate) fn malformed(key: &str, reason: impl Into<String>) -> Self {
        DailyStatusError::MalformedRegion {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DailyStatusError>;
