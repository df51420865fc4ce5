//! Sorting work items into the buckets the status template renders.
//!
//! The built-in policy is [`DefaultGrouping`]. Anything implementing
//! [`GroupItem`] can replace it, including a plain closure with the same
//! signature.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::item::{ItemKind, WorkItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Current,
    Todo,
    Other,
    Ignored,
}

/// Where deny-listed items end up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenyListed {
    /// Kept out of the status but listed in the scratch section.
    #[default]
    Other,
    /// Dropped entirely.
    Ignored,
}

impl From<DenyListed> for Bucket {
    fn from(value: DenyListed) -> Self {
        match value {
            DenyListed::Other => Bucket::Other,
            DenyListed::Ignored => Bucket::Ignored,
        }
    }
}

/// Label and milestone lists the grouping policy consults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyRules {
    pub bad_labels: Vec<String>,
    pub bad_milestones: Vec<String>,
    pub auto_todo_labels: Vec<String>,
    pub auto_todo_milestones: Vec<String>,
    pub auto_doing_labels: Vec<String>,
    pub auto_doing_milestones: Vec<String>,
    pub deny_listed: DenyListed,
}

/// Predicates handed to grouping policies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Helpers;

impl Helpers {
    pub fn is_pr(&self, item: &WorkItem) -> bool {
        item.kind() == ItemKind::PullRequest
    }

    pub fn is_issue(&self, item: &WorkItem) -> bool {
        item.kind() == ItemKind::Issue
    }

    pub fn is_gist(&self, item: &WorkItem) -> bool {
        item.kind() == ItemKind::Gist
    }

    pub fn has_any_label<S: AsRef<str>>(&self, item: &WorkItem, labels: &[S]) -> bool {
        item.label_names()
            .any(|name| labels.iter().any(|l| l.as_ref() == name))
    }

    pub fn has_any_milestone<S: AsRef<str>>(&self, item: &WorkItem, milestones: &[S]) -> bool {
        item.milestone_title()
            .is_some_and(|title| milestones.iter().any(|m| m.as_ref() == title))
    }
}

/// A grouping policy: decides the bucket of `item`, the `index`-th of `items`.
pub trait GroupItem: Send + Sync {
    fn group(
        &self,
        item: &WorkItem,
        rules: &ClassifyRules,
        helpers: &Helpers,
        index: usize,
        items: &[WorkItem],
    ) -> Bucket;
}

impl<F> GroupItem for F
where
    F: Fn(&WorkItem, &ClassifyRules, &Helpers, usize, &[WorkItem]) -> Bucket + Send + Sync,
{
    fn group(
        &self,
        item: &WorkItem,
        rules: &ClassifyRules,
        helpers: &Helpers,
        index: usize,
        items: &[WorkItem],
    ) -> Bucket {
        self(item, rules, helpers, index, items)
    }
}

/// Deny-list first, then doing, then todo; everything else is `Other`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGrouping;

impl GroupItem for DefaultGrouping {
    fn group(
        &self,
        item: &WorkItem,
        rules: &ClassifyRules,
        h: &Helpers,
        _index: usize,
        _items: &[WorkItem],
    ) -> Bucket {
        if h.has_any_label(item, &rules.bad_labels)
            || h.has_any_milestone(item, &rules.bad_milestones)
        {
            return rules.deny_listed.into();
        }

        if h.is_pr(item)
            || h.has_any_label(item, &rules.auto_doing_labels)
            || h.has_any_milestone(item, &rules.auto_doing_milestones)
        {
            return Bucket::Current;
        }

        // pull requests have no todo
        if h.is_issue(item)
            && (h.has_any_label(item, &rules.auto_todo_labels)
                || h.has_any_milestone(item, &rules.auto_todo_milestones))
        {
            return Bucket::Todo;
        }

        Bucket::Other
    }
}

/// Items split by bucket, in input order. Ignored items are dropped.
#[derive(Debug, Default)]
pub struct Buckets<'a> {
    pub current: Vec<&'a WorkItem>,
    pub todo: Vec<&'a WorkItem>,
    pub other: Vec<&'a WorkItem>,
}

pub fn classify<'a>(
    grouping: &dyn GroupItem,
    rules: &ClassifyRules,
    items: &'a [WorkItem],
) -> Buckets<'a> {
    let helpers = Helpers;
    let mut buckets = Buckets::default();
    for (index, item) in items.iter().enumerate() {
        let bucket = grouping.group(item, rules, &helpers, index, items);
        debug!(number = %item.number(), ?bucket, "Classified item");
        match bucket {
            Bucket::Current => buckets.current.push(item),
            Bucket::Todo => buckets.todo.push(item),
            Bucket::Other => buckets.other.push(item),
            Bucket::Ignored => {}
        }
    }
    buckets
}
