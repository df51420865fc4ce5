//! Builds the run configuration from the optional YAML file and the command line.
//!
//! Precedence, lowest first: built-in defaults, the YAML file given with
//! `--config`, command-line flags. Every YAML key is optional; unknown keys are
//! rejected so a typo does not silently fall back to a default.
//!
//! The GitHub token is resolved separately by [`resolve_api_key`], after the
//! workspace has been checked, because it may prompt.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use daily_status_core::classify::DenyListed;
use daily_status_core::config::{Decision, StatusConfig};
use daily_status_core::contract::Prompter;
use daily_status_core::error::DailyStatusError;
use daily_status_core::sync::ConflictPolicy;
use daily_status_core::template::{format_date, DateFormat};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::cli::Cli;

pub const DEFAULT_API_KEY_FILE: &str = "~/.github.token";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// The YAML file as written by the user.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub file: Option<PathBuf>,
    pub remote: Option<String>,
    pub api_key_file: Option<String>,
    pub reset: Option<Decision>,
    pub deploy: Option<Decision>,
    pub prs_query_extra: Option<String>,
    pub issues_query_extra: Option<String>,
    pub gists_query_extra: Option<String>,
    pub queries_extra: Option<String>,
    pub bad_labels: Option<Vec<String>>,
    pub bad_milestones: Option<Vec<String>>,
    pub auto_todo_labels: Option<Vec<String>>,
    pub auto_todo_milestones: Option<Vec<String>>,
    pub auto_doing_labels: Option<Vec<String>>,
    pub auto_doing_milestones: Option<Vec<String>>,
    pub deny_listed: Option<DenyListed>,
    pub conflict_policy: Option<ConflictPolicy>,
    pub max_sync_attempts: Option<u32>,
    pub commit_message: Option<String>,
    pub custom: Option<Map<String, Value>>,
    pub template: Option<TemplateSection>,
}

/// `template:` section. Keys other than the three settings are template slots.
#[derive(Debug, Default, Deserialize)]
pub struct TemplateSection {
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub item_separator: Option<String>,
    #[serde(default)]
    pub person_separator: Option<String>,
    #[serde(flatten)]
    pub slots: BTreeMap<String, String>,
}

/// Configuration for one run plus where the token lives.
#[derive(Debug)]
pub struct Settings {
    pub status: StatusConfig,
    pub api_key_file: PathBuf,
}

pub fn read_file_config(path: &Path) -> Result<FileConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {}: {e}", path.display()));
        }
    };

    match serde_yaml::from_str::<Option<FileConfig>>(&content) {
        Ok(parsed) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(parsed.unwrap_or_default())
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config file {}: {e}", path.display()))
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> DailyStatusError {
    DailyStatusError::InvalidConfig {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Splits a `--custom` entry at the first `=`.
pub fn parse_custom(entry: &str) -> Result<(String, String), DailyStatusError> {
    match entry.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(invalid(
            "custom",
            format!("invalid value {entry:?}, expected KEY=VALUE"),
        )),
    }
}

/// Replaces a leading `~` with `home`.
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

fn flag_decision(yes: bool, no: bool) -> Option<Decision> {
    match (yes, no) {
        (true, _) => Some(Decision::Yes),
        (_, true) => Some(Decision::No),
        _ => None,
    }
}

/// Merges defaults, the YAML file and the flags into [`Settings`].
pub fn load_settings(cli: &Cli, repo_dir: &Path) -> Result<Settings> {
    let file = match &cli.config {
        Some(path) => read_file_config(path)?,
        None => FileConfig::default(),
    };

    let mut status = StatusConfig::new(repo_dir);

    if let Some(path) = cli.file.clone().or(file.file) {
        status.file = path;
    }
    if let Some(remote) = cli.remote.clone().or(file.remote) {
        status.sync.remote = remote;
    }
    if let Some(decision) = flag_decision(cli.reset, cli.no_reset).or(file.reset) {
        status.reset = decision;
    }
    if let Some(decision) = flag_decision(cli.deploy, cli.no_deploy).or(file.deploy) {
        status.deploy = decision;
    }

    let queries = &mut status.queries;
    for (target, flag, from_file) in [
        (&mut queries.prs_query_extra, &cli.prs_query_extra, file.prs_query_extra),
        (&mut queries.issues_query_extra, &cli.issues_query_extra, file.issues_query_extra),
        (&mut queries.gists_query_extra, &cli.gists_query_extra, file.gists_query_extra),
        (&mut queries.queries_extra, &cli.queries_extra, file.queries_extra),
    ] {
        if let Some(value) = flag.clone().or(from_file) {
            *target = value;
        }
    }

    let rules = &mut status.rules;
    for (target, flag, from_file) in [
        (&mut rules.bad_labels, &cli.bad_labels, file.bad_labels),
        (&mut rules.bad_milestones, &cli.bad_milestones, file.bad_milestones),
        (&mut rules.auto_todo_labels, &cli.todo_labels, file.auto_todo_labels),
        (&mut rules.auto_todo_milestones, &cli.todo_milestones, file.auto_todo_milestones),
        (&mut rules.auto_doing_labels, &cli.doing_labels, file.auto_doing_labels),
        (&mut rules.auto_doing_milestones, &cli.doing_milestones, file.auto_doing_milestones),
    ] {
        if let Some(values) = flag.clone().or(from_file) {
            *target = values;
        }
    }
    if let Some(deny_listed) = file.deny_listed {
        status.rules.deny_listed = deny_listed;
    }

    if let Some(policy) = cli.conflict_policy.or(file.conflict_policy) {
        status.sync.conflict_policy = policy;
    }
    if let Some(attempts) = file.max_sync_attempts {
        if attempts == 0 {
            return Err(invalid("max_sync_attempts", "must be at least 1").into());
        }
        status.sync.max_attempts = attempts;
    }
    if let Some(message) = file.commit_message {
        status.sync.commit_message = message;
    }

    if let Some(template) = file.template {
        apply_template(&mut status, template)?;
    }

    status.custom = file.custom.unwrap_or_default();
    for entry in &cli.custom {
        let (key, value) = parse_custom(entry)?;
        status.custom.insert(key, Value::String(value));
    }

    let key_file = cli
        .api_key_file
        .clone()
        .or(file.api_key_file)
        .unwrap_or_else(|| DEFAULT_API_KEY_FILE.to_string());
    let api_key_file = expand_home(&key_file, dirs::home_dir().as_deref());

    Ok(Settings {
        status,
        api_key_file,
    })
}

fn apply_template(status: &mut StatusConfig, section: TemplateSection) -> Result<()> {
    let template = &mut status.template;
    if let Some(pattern) = section.date_format {
        let format = DateFormat::Pattern(pattern);
        // rejects bad specifiers now rather than after the editor closed
        format_date(&format, chrono::NaiveDateTime::default())?;
        template.date_format = format;
    }
    if let Some(separator) = section.item_separator {
        template.item_separator = separator;
    }
    if let Some(separator) = section.person_separator {
        template.person_separator = separator;
    }
    for (slot, text) in section.slots {
        template.set_slot(slot, text);
    }
    Ok(())
}

/// Finds the GitHub token: flag, then `GITHUB_TOKEN`, then the key file, then
/// the prompt. A prompted token is written to the key file for next time.
pub fn resolve_api_key(
    flag: Option<&str>,
    key_file: &Path,
    prompter: &dyn Prompter,
) -> Result<String> {
    if let Some(key) = flag.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    if let Ok(key) = std::env::var(TOKEN_ENV) {
        if !key.trim().is_empty() {
            info!("Using GitHub token from {TOKEN_ENV}");
            return Ok(key.trim().to_string());
        }
    }
    match fs::read_to_string(key_file) {
        Ok(key) if !key.trim().is_empty() => {
            info!(path = %key_file.display(), "Using GitHub token from key file");
            return Ok(key.trim().to_string());
        }
        Ok(_) => warn!(path = %key_file.display(), "Key file is empty"),
        Err(e) => info!(path = %key_file.display(), error = %e, "No usable key file"),
    }

    let answer = prompter
        .ask("What's your GitHub API token? ")
        .map_err(DailyStatusError::Prompt)?;
    let key = answer.trim().to_string();
    if key.is_empty() {
        return Err(invalid("api_key", "a GitHub API token is required").into());
    }
    if let Some(parent) = key_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    fs::write(key_file, &key)
        .with_context(|| format!("cannot save the token to {}", key_file.display()))?;
    info!(path = %key_file.display(), "Saved GitHub token");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_entries_split_at_first_equals() {
        assert_eq!(
            parse_custom("url = https://x?a=b").unwrap(),
            ("url".to_string(), "https://x?a=b".to_string())
        );
        let err = parse_custom("novalue").unwrap_err();
        assert!(err.to_string().contains("\"novalue\""));
        assert!(parse_custom("=x").is_err());
    }

    #[test]
    fn home_is_expanded_only_at_the_start() {
        let home = Some(Path::new("/home/me"));
        assert_eq!(
            expand_home("~/.github.token", home),
            PathBuf::from("/home/me/.github.token")
        );
        assert_eq!(expand_home("~", home), PathBuf::from("/home/me"));
        assert_eq!(expand_home("~other/x", home), PathBuf::from("~other/x"));
        assert_eq!(expand_home("/etc/token", home), PathBuf::from("/etc/token"));
        assert_eq!(expand_home("~/t", None), PathBuf::from("~/t"));
    }

    #[test]
    fn flags_map_to_decisions() {
        assert_eq!(flag_decision(true, false), Some(Decision::Yes));
        assert_eq!(flag_decision(false, true), Some(Decision::No));
        assert_eq!(flag_decision(false, false), None);
    }
}
