//! Work items and contributors as they arrive from the issue tracker.
//!
//! The API hands back loosely shaped records; [`WorkItem`] decides once, at
//! ingestion, whether a record is an issue, a pull request or a gist. Every
//! consumer downstream matches on the variant instead of probing fields.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Item identifier. Issues and pull requests carry numbers, gists carry hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{n}"),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub title: String,
}

/// The record exactly as the source API returns it.
///
/// Fields the engine does not interpret are kept in `extra` so templates can
/// still reference them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<Milestone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_pull_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Issue,
    PullRequest,
    Gist,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkItem {
    Issue(RawItem),
    PullRequest(RawItem),
    Gist(RawItem),
}

impl From<RawItem> for WorkItem {
    fn from(raw: RawItem) -> Self {
        if raw.pull_request.is_some() {
            WorkItem::PullRequest(raw)
        } else if raw.git_pull_url.is_some() {
            WorkItem::Gist(raw)
        } else {
            WorkItem::Issue(raw)
        }
    }
}

impl<'de> Deserialize<'de> for WorkItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawItem::deserialize(deserializer).map(WorkItem::from)
    }
}

impl WorkItem {
    pub fn raw(&self) -> &RawItem {
        match self {
            WorkItem::Issue(raw) | WorkItem::PullRequest(raw) | WorkItem::Gist(raw) => raw,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            WorkItem::Issue(_) => ItemKind::Issue,
            WorkItem::PullRequest(_) => ItemKind::PullRequest,
            WorkItem::Gist(_) => ItemKind::Gist,
        }
    }

    /// Display number: the issue/PR number, or the id for gists.
    pub fn number(&self) -> String {
        let raw = self.raw();
        match raw.number {
            Some(n) => n.to_string(),
            None => raw.id.to_string(),
        }
    }

    /// Display title: the title, or the description for gists.
    pub fn title(&self) -> &str {
        let raw = self.raw();
        raw.title
            .as_deref()
            .or(raw.description.as_deref())
            .unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        &self.raw().html_url
    }

    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.raw().labels.iter().map(|l| l.name.as_str())
    }

    pub fn milestone_title(&self) -> Option<&str> {
        self.raw().milestone.as_ref().map(|m| m.title.as_str())
    }

    /// Template data for a single item: every raw field plus `NUMBER`, `TITLE` and `URL`.
    pub fn template_fields(&self) -> Map<String, Value> {
        let mut fields = match serde_json::to_value(self.raw()) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        fields.insert("NUMBER".into(), Value::String(self.number()));
        fields.insert("TITLE".into(), Value::String(self.title().to_string()));
        fields.insert("URL".into(), Value::String(self.url().to_string()));
        fields
    }
}

/// The person whose status is being written. `id` keys their region in the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub id: u64,
    pub login: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Contributor {
    pub fn new(id: u64, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            extra: Map::new(),
        }
    }

    /// `USER_<FIELD>` entries for every user field, upper-cased.
    pub fn template_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        for (key, value) in &self.extra {
            fields.insert(format!("USER_{}", key.to_uppercase()), value.clone());
        }
        fields.insert("USER_ID".into(), Value::from(self.id));
        fields.insert("USER_LOGIN".into(), Value::String(self.login.clone()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn discriminates_by_structural_markers() {
        let pr: WorkItem = serde_json::from_value(json!({
            "id": 1, "number": 7, "title": "Fix", "html_url": "https://x/pull/7",
            "labels": [], "pull_request": {"url": "https://api/x/pulls/7"}
        }))
        .unwrap();
        let gist: WorkItem = serde_json::from_value(json!({
            "id": "abc123", "description": "notes", "html_url": "https://gist/abc123",
            "git_pull_url": "https://gist/abc123.git"
        }))
        .unwrap();
        let issue: WorkItem = serde_json::from_value(json!({
            "id": 2, "number": 8, "title": "Bug", "html_url": "https://x/issues/8",
            "labels": [{"name": "bug", "color": "f00"}], "milestone": null
        }))
        .unwrap();

        assert_eq!(pr.kind(), ItemKind::PullRequest);
        assert_eq!(gist.kind(), ItemKind::Gist);
        assert_eq!(issue.kind(), ItemKind::Issue);
        assert_eq!(issue.label_names().collect::<Vec<_>>(), vec!["bug"]);
    }

    #[test]
    fn gist_falls_back_to_id_and_description() {
        let gist: WorkItem = serde_json::from_value(json!({
            "id": "abc123", "description": "notes", "html_url": "https://gist/abc123",
            "git_pull_url": "https://gist/abc123.git"
        }))
        .unwrap();
        assert_eq!(gist.number(), "abc123");
        assert_eq!(gist.title(), "notes");

        let fields = gist.template_fields();
        assert_eq!(fields["NUMBER"], json!("abc123"));
        assert_eq!(fields["TITLE"], json!("notes"));
        assert_eq!(fields["URL"], json!("https://gist/abc123"));
    }

    #[test]
    fn keeps_unknown_fields_for_templates() {
        let issue: WorkItem = serde_json::from_value(json!({
            "id": 2, "number": 8, "title": "Bug", "html_url": "https://x/issues/8",
            "state": "open"
        }))
        .unwrap();
        assert_eq!(issue.template_fields()["state"], json!("open"));
    }

    #[test]
    fn contributor_fields_are_prefixed() {
        let user: Contributor = serde_json::from_value(json!({
            "id": 42, "login": "octo", "name": "Octo Cat"
        }))
        .unwrap();
        let fields = user.template_fields();
        assert_eq!(fields["USER_LOGIN"], json!("octo"));
        assert_eq!(fields["USER_ID"], json!(42));
        assert_eq!(fields["USER_NAME"], json!("Octo Cat"));
    }
}
