//! One full run: fetch -> draft -> edit -> merge -> write -> deploy.
//!
//! This module is the only place that sequences the engine's pieces. Every
//! side effect goes through a trait from [`crate::contract`], so the whole run
//! can be driven by mocks in tests:
//!
//! 1. Check that `repo_dir` is a git working copy holding the status page.
//! 2. Load the contributor and their pull requests, issues and gists
//!    concurrently from the [`ItemSource`].
//! 3. Decide whether a draft left over from an earlier run is reused.
//! 4. Render the draft, store it in the git metadata directory, hand it to
//!    the [`Editor`].
//! 5. Turn the edited text into the contributor's region and merge it, along
//!    with today's date header, into the page. The page is written atomically.
//! 6. Decide whether to publish, and if so run the [`SyncDriver`].
//!
//! # Draft lifecycle
//! The draft is removed only after a successful publish. When publishing is
//! declined or fails, or the edit came back empty, it stays in place so the
//! next run picks up the edited text.

use chrono::NaiveDateTime;
use futures::TryFutureExt;
use tracing::{debug, info, warn};

use crate::compose::{merge_contribution, prepare_final_markup, render_draft};
use crate::config::{Decision, StatusConfig};
use crate::contract::{Editor, Git, ItemSource, Prompter};
use crate::draft::DraftStore;
use crate::error::{BoxError, DailyStatusError, Result};
use crate::io::atomic_write;
use crate::region::Document;
use crate::sync::{SyncDriver, SyncReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchroniseReport {
    pub login: String,
    pub items_fetched: usize,
    /// Whether the page content differs from what was on disk before the run.
    pub document_changed: bool,
    /// `None` when publishing was declined.
    pub sync: Option<SyncReport>,
}

/// Fails unless `repo_dir` has a `.git` entry and the status page exists.
pub fn ensure_workspace(config: &StatusConfig) -> Result<()> {
    if !config.repo_dir.join(".git").exists() {
        return Err(DailyStatusError::NotAGitRepository(config.repo_dir.clone()));
    }
    let page = config.page_path();
    if !page.is_file() {
        return Err(DailyStatusError::MissingFile(page));
    }
    Ok(())
}

fn decide<P: Prompter + ?Sized>(decision: Decision, prompter: &P, question: &str) -> Result<bool> {
    match decision {
        Decision::Yes => Ok(true),
        Decision::No => Ok(false),
        Decision::Ask => prompter.confirm(question).map_err(DailyStatusError::Prompt),
    }
}

fn source_error(what: &'static str) -> impl FnOnce(BoxError) -> DailyStatusError {
    move |source| DailyStatusError::Source { what, source }
}

pub async fn synchronise<S, G, E, P>(
    config: &StatusConfig,
    source: &S,
    git: &G,
    editor: &E,
    prompter: &P,
    now: NaiveDateTime,
) -> Result<SynchroniseReport>
where
    S: ItemSource + ?Sized,
    G: Git + ?Sized,
    E: Editor + ?Sized,
    P: Prompter + ?Sized,
{
    info!(page = %config.page_path().display(), "[SYNC] Starting daily status run");
    ensure_workspace(config)?;

    let query = config.queries.to_query();
    debug!(?query, "[SYNC] Item queries");
    let (contributor, prs, issues, gists) = futures::try_join!(
        source.current_user().map_err(source_error("user")),
        source.search_items(&query.prs).map_err(source_error("pull requests")),
        source.search_items(&query.issues).map_err(source_error("issues")),
        source.gists(&query.gists).map_err(source_error("gists"))
    )?;
    info!(
        login = %contributor.login,
        prs = prs.len(),
        issues = issues.len(),
        gists = gists.len(),
        "[SYNC] Loaded items"
    );
    let items: Vec<_> = prs.into_iter().chain(issues).chain(gists).collect();

    let store = DraftStore::for_repo(&config.repo_dir);
    let previous = match store.load()? {
        Some(text) => {
            if decide(config.reset, prompter, "A draft from an earlier run exists. Discard it and start over?")? {
                store.clear()?;
                None
            } else {
                info!(path = %store.path().display(), "[SYNC] Reusing earlier draft");
                Some(text)
            }
        }
        None => None,
    };

    let draft = render_draft(config, &contributor, &items, previous.as_deref())?;
    store.save(&draft.text)?;
    editor
        .edit(store.path())
        .await
        .map_err(|source| DailyStatusError::Editor {
            path: store.path().to_path_buf(),
            source,
        })?;
    let edited = store.load()?.unwrap_or_default();

    if draft.is_unchanged(&edited) {
        if config.deploy == Decision::Ask {
            if !prompter
                .confirm("The status was not changed. Continue anyway?")
                .map_err(DailyStatusError::Prompt)?
            {
                return Err(DailyStatusError::Aborted("status left unchanged".to_string()));
            }
        } else {
            info!("[SYNC] Status left unchanged, continuing");
        }
    }

    let markup = prepare_final_markup(config, &contributor, &edited)?;

    let page_path = config.page_path();
    let before = std::fs::read_to_string(&page_path)?;
    let merged = merge_contribution(config, &Document::parse(&before), &markup, now)?;
    let mut after = merged.to_string();
    if !after.ends_with('\n') {
        after.push('\n');
    }
    let document_changed = after != before;
    atomic_write(&page_path, after.as_bytes())?;
    info!(path = %page_path.display(), changed = document_changed, "[SYNC] Wrote status page");

    let sync = if decide(config.deploy, prompter, "Commit and push the updated status?")? {
        match SyncDriver::new(git, editor, &config.repo_dir, &config.sync).run().await {
            Ok(report) => {
                store.clear()?;
                info!(branch = %report.branch, attempts = report.attempts, "[SYNC] Published");
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, draft = %store.path().display(), "[SYNC][ERROR] Publishing failed, draft kept");
                return Err(e);
            }
        }
    } else {
        info!(draft = %store.path().display(), "[SYNC] Not publishing, draft kept");
        None
    };

    Ok(SynchroniseReport {
        login: contributor.login,
        items_fetched: items.len(),
        document_changed,
        sync,
    })
}
