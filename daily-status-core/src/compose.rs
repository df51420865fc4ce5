//! Turning classified items into a draft, and an edited draft into a page update.

use std::fmt;

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::debug;

use crate::classify::classify;
use crate::config::StatusConfig;
use crate::error::{DailyStatusError, Result};
use crate::item::{Contributor, ItemKind, WorkItem};
use crate::region::{strip_scratch_trailer, Document, Placement, RegionKey, SCRATCH_SEPARATOR};
use crate::template::{render_date, render_list, render_literal, TemplateData, CONTAINER_SLOT};

/// Data slot holding the tracked part of the draft. The container sees the
/// carried-over text, or an empty string on a fresh draft; the scratch block
/// sees whatever ended up on top.
pub const CURRENT_RENDERED_FILE: &str = "CURRENT_RENDERED_FILE";

fn scratch_template() -> String {
    format!(
        "{SCRATCH_SEPARATOR}\n\n\
         **Issues:**\n{{{{OTHER_ISSUES}}}}\n\n\
         **PRs:**\n{{{{OTHER_PULL_REQUESTS}}}}\n\n\
         **Gists:**\n{{{{OTHER_GISTS}}}}"
    )
}

/// The text handed to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
}

impl Draft {
    /// Whether `edited` differs from the draft only in surrounding whitespace.
    pub fn is_unchanged(&self, edited: &str) -> bool {
        self.text.trim() == edited.trim()
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn split_by_kind<'a>(items: &[&'a WorkItem]) -> (Vec<&'a WorkItem>, Vec<&'a WorkItem>) {
    items
        .iter()
        .copied()
        .partition(|item| item.kind() != ItemKind::PullRequest)
}

fn insert_list(
    data: &mut TemplateData,
    config: &StatusConfig,
    name: &str,
    key: &str,
    items: &[&WorkItem],
) -> Result<()> {
    data.insert(name.to_string(), serde_json::to_value(items)?);
    data.insert(key.to_string(), Value::String(render_list(&config.template, items)?));
    Ok(())
}

/// Builds the draft: the tracked part on top, the scratch block below the separator.
///
/// With a `previous` draft its tracked part is carried over verbatim instead of
/// the freshly rendered container, while the scratch block is always rebuilt.
pub fn render_draft(
    config: &StatusConfig,
    contributor: &Contributor,
    items: &[WorkItem],
    previous: Option<&str>,
) -> Result<Draft> {
    let (gists, work): (Vec<WorkItem>, Vec<WorkItem>) = items
        .iter()
        .cloned()
        .partition(|item| item.kind() == ItemKind::Gist);
    let buckets = classify(config.grouping.as_ref(), &config.rules, &work);

    let (current_issues, current_prs) = split_by_kind(&buckets.current);
    let (todo_issues, todo_prs) = split_by_kind(&buckets.todo);
    let (other_issues, mut other_prs) = split_by_kind(&buckets.other);
    let mut later_prs = todo_prs;
    later_prs.append(&mut other_prs);
    let gists: Vec<&WorkItem> = gists.iter().collect();

    let mut data = contributor.template_fields();
    data.insert("custom".into(), Value::Object(config.custom.clone()));
    insert_list(&mut data, config, "currentIssues", "CURRENT_ISSUES", &current_issues)?;
    insert_list(&mut data, config, "todoIssues", "TODO_ISSUES", &todo_issues)?;
    insert_list(&mut data, config, "otherIssues", "OTHER_ISSUES", &other_issues)?;
    insert_list(&mut data, config, "currentPullRequests", "CURRENT_PULL_REQUESTS", &current_prs)?;
    insert_list(&mut data, config, "otherPullRequests", "OTHER_PULL_REQUESTS", &later_prs)?;
    insert_list(&mut data, config, "otherGists", "OTHER_GISTS", &gists)?;

    let carried = previous.map(|text| strip_scratch_trailer(text).trim_end().to_string());
    data.insert(
        CURRENT_RENDERED_FILE.into(),
        Value::String(carried.clone().unwrap_or_default()),
    );
    let top = match carried {
        Some(text) => text,
        None => {
            let rendered = config.template.render_slot(CONTAINER_SLOT, &data)?;
            data.insert(CURRENT_RENDERED_FILE.into(), Value::String(rendered.clone()));
            rendered
        }
    };
    let scratch = render_literal(&scratch_template(), &data);

    debug!(
        login = %contributor.login,
        current = buckets.current.len(),
        todo = buckets.todo.len(),
        other = buckets.other.len(),
        gists = gists.len(),
        carried_over = previous.is_some(),
        "Rendered draft"
    );
    Ok(Draft {
        text: [top.as_str(), "", scratch.as_str()].join("\n"),
    })
}

/// A contributor's region, ready to be spliced into the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalMarkup {
    pub key: RegionKey,
    /// Inner lines, without the sentinels.
    pub lines: Vec<String>,
}

impl fmt::Display for FinalMarkup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.key.start_marker())?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        f.write_str(&self.key.end_marker())
    }
}

/// Drops the scratch block from the edited draft and frames what is left.
pub fn prepare_final_markup(
    config: &StatusConfig,
    contributor: &Contributor,
    edited: &str,
) -> Result<FinalMarkup> {
    let tracked = strip_scratch_trailer(edited);
    let trimmed = tracked.trim();
    if trimmed.is_empty() {
        return Err(DailyStatusError::EmptyMarkup {
            login: contributor.login.clone(),
        });
    }

    let mut lines: Vec<String> = trimmed.split('\n').map(str::to_string).collect();
    lines.push(String::new());
    lines.extend(config.template.person_separator.split('\n').map(str::to_string));
    lines.push(String::new());
    Ok(FinalMarkup {
        key: RegionKey::User(contributor.id),
        lines,
    })
}

/// Replaces the contributor's region (appending it the first time), then the
/// date header (prepending it the first time).
pub fn merge_contribution(
    config: &StatusConfig,
    document: &Document,
    markup: &FinalMarkup,
    date: NaiveDateTime,
) -> Result<Document> {
    let with_user = document.replace_region(markup.key, markup.lines.as_slice())?;
    let rendered = render_date(&config.template, date)?;
    let date_lines: Vec<&str> = rendered.split('\n').collect();
    with_user.replace_region_with(RegionKey::Date, date_lines.as_slice(), Placement::Prepend)
}
