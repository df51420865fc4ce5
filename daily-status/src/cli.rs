//! Command-line surface of `daily-status`.
//!
//! Parsing lives in [`Cli`]; [`run`] wires the real adapters (GitHub, git,
//! `$EDITOR`, stdin prompts) into the core pipeline. Everything else belongs
//! in `daily-status-core`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use daily_status_core::git::GitCli;
use daily_status_core::sync::ConflictPolicy;
use daily_status_core::synchronise::{ensure_workspace, synchronise};

use crate::editor::SystemEditor;
use crate::github::GitHubClient;
use crate::load_config::{load_settings, resolve_api_key};
use crate::prompt::StdinPrompter;

/// Merge your open issues and pull requests into the team's status page and push it.
#[derive(Parser, Debug)]
#[clap(name = "daily-status", version)]
pub struct Cli {
    /// YAML config file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Markdown file to update. Default: Home.md
    #[clap(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// GitHub API token
    #[clap(short = 'a', long)]
    pub api_key: Option<String>,

    /// File that stores the GitHub API token. Default: ~/.github.token
    #[clap(long)]
    pub api_key_file: Option<String>,

    /// Output extra debugging
    #[clap(short = 'd', long)]
    pub debug: bool,

    /// Start from a fresh draft
    #[clap(long, overrides_with = "no_reset")]
    pub reset: bool,

    /// Reuse the draft from an earlier run if there is one
    #[clap(long)]
    pub no_reset: bool,

    /// Commit and push without asking
    #[clap(long, overrides_with = "no_deploy")]
    pub deploy: bool,

    /// Only update the file, do not commit or push
    #[clap(long)]
    pub no_deploy: bool,

    /// Git remote to pull from and push to. Default: origin
    #[clap(short = 'r', long)]
    pub remote: Option<String>,

    /// Labels that keep an item out of the status
    #[clap(long, num_args = 1..)]
    pub bad_labels: Option<Vec<String>>,

    /// Milestones that keep an item out of the status
    #[clap(long, num_args = 1..)]
    pub bad_milestones: Option<Vec<String>>,

    /// Labels that mark an issue as next
    #[clap(long, num_args = 1..)]
    pub todo_labels: Option<Vec<String>>,

    /// Milestones that mark an issue as next
    #[clap(long, num_args = 1..)]
    pub todo_milestones: Option<Vec<String>>,

    /// Labels that mark an item as in progress
    #[clap(long, num_args = 1..)]
    pub doing_labels: Option<Vec<String>>,

    /// Milestones that mark an item as in progress
    #[clap(long, num_args = 1..)]
    pub doing_milestones: Option<Vec<String>>,

    /// Extra terms for the pull request search
    #[clap(long)]
    pub prs_query_extra: Option<String>,

    /// Extra terms for the issue search
    #[clap(long)]
    pub issues_query_extra: Option<String>,

    /// Extra terms for the gist listing
    #[clap(long)]
    pub gists_query_extra: Option<String>,

    /// Extra terms for every search
    #[clap(long)]
    pub queries_extra: Option<String>,

    /// Custom template value, KEY=VALUE
    #[clap(short = 'C', long = "custom", value_name = "KEY=VALUE", num_args = 1..)]
    pub custom: Vec<String>,

    /// How to settle rebase conflicts: interactive or accept-theirs
    #[clap(long, value_parser = parse_conflict_policy)]
    pub conflict_policy: Option<ConflictPolicy>,

    /// GitHub API base URL
    #[clap(long, default_value = GitHubClient::DEFAULT_BASE_URL)]
    pub api_url: String,
}

fn parse_conflict_policy(value: &str) -> std::result::Result<ConflictPolicy, String> {
    match value {
        "interactive" => Ok(ConflictPolicy::Interactive),
        "accept-theirs" => Ok(ConflictPolicy::AcceptTheirs),
        other => Err(format!(
            "unknown conflict policy {other:?}, expected interactive or accept-theirs"
        )),
    }
}

/// One daily-status run in the current directory.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("daily-status starting");

    let repo_dir = std::env::current_dir().context("cannot determine the current directory")?;
    let settings = load_settings(&cli, &repo_dir)?;
    settings.status.trace_loaded();
    ensure_workspace(&settings.status)?;

    let prompter = StdinPrompter;
    let api_key = resolve_api_key(cli.api_key.as_deref(), &settings.api_key_file, &prompter)?;
    let source = GitHubClient::new(&cli.api_url, &api_key)
        .context("failed to build the GitHub client")?;
    let git = GitCli::new(&repo_dir);
    let editor = SystemEditor::from_env()?;
    let now = chrono::Local::now().naive_local();

    let report = synchronise(&settings.status, &source, &git, &editor, &prompter, now).await?;
    tracing::info!(
        login = %report.login,
        items = report.items_fetched,
        changed = report.document_changed,
        published = report.sync.is_some(),
        "daily-status finished"
    );
    Ok(())
}
