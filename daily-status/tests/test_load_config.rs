use std::env;
use std::fs::{self, write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::Parser;
use daily_status::cli::Cli;
use daily_status::load_config::{load_settings, read_file_config, resolve_api_key};
use daily_status_core::classify::DenyListed;
use daily_status_core::config::Decision;
use daily_status_core::contract::MockPrompter;
use daily_status_core::sync::ConflictPolicy;
use daily_status_core::template::{DateFormat, Template};
use serde_json::json;
use serial_test::serial;
use tempfile::{tempdir, NamedTempFile};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry};

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["daily-status"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("arguments should parse")
}

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

const FULL_CONFIG: &str = r#"
file: Status.md
remote: upstream
api_key_file: /tmp/keys/gh
reset: true
deploy: ask
prs_query_extra: "is:open author:@me draft:false"
queries_extra: "sort:created-asc"
bad_labels: [blocked, wontfix]
auto_todo_labels: [next]
auto_doing_milestones: ["Sprint 12"]
deny_listed: ignored
conflict_policy: accept-theirs
max_sync_attempts: 5
commit_message: "Status update"
custom:
  team: core
  size: 4
template:
  date_format: "%Y-%m-%d"
  person_separator: "***"
  item: "- {{TITLE}}"
"#;

#[test]
#[serial]
fn yaml_file_is_merged_over_defaults() {
    let file = config_file(FULL_CONFIG);
    let path = file.path().to_str().unwrap();

    let settings = load_settings(&cli(&["-c", path]), Path::new("/wiki")).expect("config loads");
    let status = &settings.status;

    assert_eq!(status.page_path(), PathBuf::from("/wiki/Status.md"));
    assert_eq!(status.sync.remote, "upstream");
    assert_eq!(status.reset, Decision::Yes);
    assert_eq!(status.deploy, Decision::Ask);
    assert_eq!(status.queries.prs_query_extra, "is:open author:@me draft:false");
    assert_eq!(status.queries.issues_query_extra, "is:open assignee:@me");
    assert_eq!(
        status.queries.to_query().prs,
        "is:pr sort:created-asc is:open author:@me draft:false"
    );
    assert_eq!(status.rules.bad_labels, vec!["blocked", "wontfix"]);
    assert_eq!(status.rules.auto_todo_labels, vec!["next"]);
    assert_eq!(status.rules.auto_doing_milestones, vec!["Sprint 12"]);
    assert_eq!(status.rules.deny_listed, DenyListed::Ignored);
    assert_eq!(status.sync.conflict_policy, ConflictPolicy::AcceptTheirs);
    assert_eq!(status.sync.max_attempts, 5);
    assert_eq!(status.sync.commit_message, "Status update");
    assert_eq!(status.custom.get("team"), Some(&json!("core")));
    assert_eq!(status.custom.get("size"), Some(&json!(4)));
    assert!(matches!(&status.template.date_format, DateFormat::Pattern(p) if p == "%Y-%m-%d"));
    assert_eq!(status.template.person_separator, "***");
    assert!(matches!(
        status.template.slot("item"),
        Some(Template::Literal(t)) if t == "- {{TITLE}}"
    ));
    assert_eq!(settings.api_key_file, PathBuf::from("/tmp/keys/gh"));
}

#[test]
#[serial]
fn flags_override_the_file() {
    let file = config_file(FULL_CONFIG);
    let path = file.path().to_str().unwrap();

    let settings = load_settings(
        &cli(&[
            "-c",
            path,
            "-f",
            "Other.md",
            "-r",
            "origin",
            "--no-reset",
            "--deploy",
            "--bad-labels",
            "later",
            "--conflict-policy",
            "interactive",
            "-C",
            "team=platform",
            "sprint=12",
        ]),
        Path::new("/wiki"),
    )
    .expect("config loads");
    let status = &settings.status;

    assert_eq!(status.file, PathBuf::from("Other.md"));
    assert_eq!(status.sync.remote, "origin");
    assert_eq!(status.reset, Decision::No);
    assert_eq!(status.deploy, Decision::Yes);
    assert_eq!(status.rules.bad_labels, vec!["later"]);
    assert_eq!(status.sync.conflict_policy, ConflictPolicy::Interactive);
    assert_eq!(status.custom.get("team"), Some(&json!("platform")));
    assert_eq!(status.custom.get("sprint"), Some(&json!("12")));
    assert_eq!(status.custom.get("size"), Some(&json!(4)));
}

#[test]
#[serial]
fn defaults_without_a_config_file() {
    env::set_var("HOME", "/home/tester");
    let settings = load_settings(&cli(&[]), Path::new("/wiki")).expect("defaults load");

    assert_eq!(settings.status.file, PathBuf::from("Home.md"));
    assert_eq!(settings.status.reset, Decision::Ask);
    assert_eq!(settings.status.deploy, Decision::Ask);
    assert_eq!(settings.status.sync.remote, "origin");
    assert_eq!(settings.api_key_file, PathBuf::from("/home/tester/.github.token"));
}

#[test]
#[serial]
fn invalid_values_are_rejected() {
    let zero = config_file("max_sync_attempts: 0\n");
    let err = load_settings(&cli(&["-c", zero.path().to_str().unwrap()]), Path::new("."))
        .unwrap_err();
    assert!(err.to_string().contains("max_sync_attempts"), "got: {err}");

    let date = config_file("template:\n  date_format: \"%Q\"\n");
    let err = load_settings(&cli(&["-c", date.path().to_str().unwrap()]), Path::new("."))
        .unwrap_err();
    assert!(err.to_string().contains("template.date_format"), "got: {err}");

    let typo = config_file("remtoe: upstream\n");
    let err = read_file_config(typo.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"), "got: {err}");

    let err = load_settings(&cli(&["-C", "novalue"]), Path::new(".")).unwrap_err();
    assert!(err.to_string().contains("novalue"), "got: {err}");
}

#[test]
fn empty_config_file_means_defaults() {
    let file = config_file("");
    let parsed = read_file_config(file.path()).expect("empty file is fine");
    assert!(parsed.remote.is_none());
}

#[test]
fn missing_config_file_is_reported() {
    let err = read_file_config(Path::new("/nonexistent/daily-status.yaml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn api_key_prefers_flag_then_env_then_file() {
    let dir = tempdir().unwrap();
    let key_file = dir.path().join("token");
    write(&key_file, "from-file\n").unwrap();
    let prompter = MockPrompter::new();

    env::set_var("GITHUB_TOKEN", "from-env");
    assert_eq!(
        resolve_api_key(Some("from-flag"), &key_file, &prompter).unwrap(),
        "from-flag"
    );
    assert_eq!(resolve_api_key(None, &key_file, &prompter).unwrap(), "from-env");

    env::remove_var("GITHUB_TOKEN");
    assert_eq!(resolve_api_key(None, &key_file, &prompter).unwrap(), "from-file");
}

#[test]
#[serial]
fn prompted_api_key_is_saved() {
    env::remove_var("GITHUB_TOKEN");
    let dir = tempdir().unwrap();
    let key_file = dir.path().join("nested").join("token");
    let mut prompter = MockPrompter::new();
    prompter
        .expect_ask()
        .withf(|q: &str| q.contains("GitHub API token"))
        .times(1)
        .returning(|_| Ok("  typed-token \n".to_string()));

    assert_eq!(resolve_api_key(None, &key_file, &prompter).unwrap(), "typed-token");
    assert_eq!(fs::read_to_string(&key_file).unwrap(), "typed-token");
}

#[test]
#[serial]
fn empty_prompted_api_key_is_an_error() {
    env::remove_var("GITHUB_TOKEN");
    let dir = tempdir().unwrap();
    let key_file = dir.path().join("token");
    let mut prompter = MockPrompter::new();
    prompter.expect_ask().returning(|_| Ok(String::new()));

    assert!(resolve_api_key(None, &key_file, &prompter).is_err());
    assert!(!key_file.exists());
}

/// Collects the Debug form of every event.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{event:?}"));
    }
}

#[test]
fn loading_a_file_is_traced() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = Registry::default().with(EventCollector {
        events: events.clone(),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let file = config_file("remote: upstream\n");
    read_file_config(file.path()).unwrap();

    let events = events.lock().unwrap();
    assert!(
        events.iter().any(|e| e.contains("Loading configuration from file")),
        "missing load event: {events:?}"
    );
    assert!(events.iter().any(|e| e.contains("Parsed config YAML successfully")));
}
