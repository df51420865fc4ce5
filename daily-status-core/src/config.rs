use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::classify::{ClassifyRules, DefaultGrouping, GroupItem};
use crate::contract::ItemQuery;
use crate::sync::SyncConfig;
use crate::template::TemplateConfig;

/// A yes/no switch that can defer to the user: `true`, `false` or `"ask"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DecisionRepr", into = "DecisionRepr")]
pub enum Decision {
    Yes,
    No,
    #[default]
    Ask,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DecisionRepr {
    Bool(bool),
    Word(String),
}

impl TryFrom<DecisionRepr> for Decision {
    type Error = String;

    fn try_from(value: DecisionRepr) -> Result<Self, Self::Error> {
        match value {
            DecisionRepr::Bool(true) => Ok(Decision::Yes),
            DecisionRepr::Bool(false) => Ok(Decision::No),
            DecisionRepr::Word(word) => match word.to_ascii_lowercase().as_str() {
                "ask" => Ok(Decision::Ask),
                "true" | "yes" => Ok(Decision::Yes),
                "false" | "no" => Ok(Decision::No),
                _ => Err(format!("expected true, false or \"ask\", got {word:?}")),
            },
        }
    }
}

impl From<Decision> for DecisionRepr {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Yes => DecisionRepr::Bool(true),
            Decision::No => DecisionRepr::Bool(false),
            Decision::Ask => DecisionRepr::Word("ask".to_string()),
        }
    }
}

impl From<bool> for Decision {
    fn from(value: bool) -> Self {
        if value {
            Decision::Yes
        } else {
            Decision::No
        }
    }
}

/// Extra search terms appended to the built-in `is:pr` / `is:issue` queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub prs_query_extra: String,
    pub issues_query_extra: String,
    pub gists_query_extra: String,
    pub queries_extra: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            prs_query_extra: "is:open author:@me".to_string(),
            issues_query_extra: "is:open assignee:@me".to_string(),
            gists_query_extra: String::new(),
            queries_extra: "sort:updated-desc".to_string(),
        }
    }
}

impl QueryConfig {
    pub fn to_query(&self) -> ItemQuery {
        ItemQuery {
            prs: collapse(&["is:pr", self.queries_extra.as_str(), self.prs_query_extra.as_str()]),
            issues: collapse(&["is:issue", self.queries_extra.as_str(), self.issues_query_extra.as_str()]),
            gists: collapse(&[self.queries_extra.as_str(), self.gists_query_extra.as_str()]),
        }
    }
}

fn collapse(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Everything one run needs, already merged from file, flags and defaults.
#[derive(Clone)]
pub struct StatusConfig {
    /// Working copy that holds the status page.
    pub repo_dir: PathBuf,
    /// Status page, relative to `repo_dir`.
    pub file: PathBuf,
    pub reset: Decision,
    pub deploy: Decision,
    pub queries: QueryConfig,
    pub rules: ClassifyRules,
    pub grouping: Arc<dyn GroupItem>,
    pub template: TemplateConfig,
    /// Free-form values handed to templates as `custom`.
    pub custom: Map<String, Value>,
    pub sync: SyncConfig,
}

impl StatusConfig {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            file: PathBuf::from("Home.md"),
            reset: Decision::Ask,
            deploy: Decision::Ask,
            queries: QueryConfig::default(),
            rules: ClassifyRules::default(),
            grouping: Arc::new(DefaultGrouping),
            template: TemplateConfig::default(),
            custom: Map::new(),
            sync: SyncConfig::default(),
        }
    }

    pub fn page_path(&self) -> PathBuf {
        self.repo_dir.join(&self.file)
    }

    pub fn trace_loaded(&self) {
        info!(
            repo_dir = %self.repo_dir.display(),
            file = %self.file.display(),
            reset = ?self.reset,
            deploy = ?self.deploy,
            remote = %self.sync.remote,
            "Loaded StatusConfig"
        );
        debug!(?self, "StatusConfig loaded (full debug)");
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

impl fmt::Debug for StatusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusConfig")
            .field("repo_dir", &self.repo_dir)
            .field("file", &self.file)
            .field("reset", &self.reset)
            .field("deploy", &self.deploy)
            .field("queries", &self.queries)
            .field("rules", &self.rules)
            .field("template", &self.template)
            .field("custom", &self.custom)
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}
