//! `$EDITOR` as the [`Editor`] seam.

use std::path::Path;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use daily_status_core::contract::Editor;
use daily_status_core::error::BoxError;
use tokio::process::Command;
use tracing::debug;

const FALLBACK_EDITOR: &str = "vi";

/// Runs the user's editor on a file and waits for it to exit.
///
/// `$EDITOR` may carry arguments (`code --wait`) and shell quoting; it is split
/// the way a POSIX shell would, and the file name goes last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemEditor {
    program: String,
    args: Vec<String>,
}

impl SystemEditor {
    pub fn from_env() -> Result<Self> {
        Self::from_command_line(&std::env::var("EDITOR").unwrap_or_default())
    }

    pub fn from_command_line(line: &str) -> Result<Self> {
        let words = shlex::split(line)
            .ok_or_else(|| anyhow!("cannot parse editor command line {line:?}"))?;
        let mut words = words.into_iter();
        Ok(match words.next() {
            Some(program) => Self {
                program,
                args: words.collect(),
            },
            None => Self {
                program: FALLBACK_EDITOR.to_string(),
                args: Vec::new(),
            },
        })
    }
}

#[async_trait]
impl Editor for SystemEditor {
    async fn edit(&self, path: &Path) -> Result<(), BoxError> {
        debug!(program = %self.program, path = %path.display(), "Opening editor");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .await
            .map_err(|e| format!("cannot start {}: {e}", self.program))?;
        if !status.success() {
            return Err(format!("{} exited with {status}", self.program).into());
        }
        Ok(())
    }
}
