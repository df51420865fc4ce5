//! `{{PLACEHOLDER}}` templates and callable templates.
//!
//! A slot in [`TemplateConfig`] is either literal text or a function. Literal
//! text gets every known `{{KEY}}` replaced in one pass; unknown keys are left
//! as they are so a template may mention slots it does not always fill.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::{Arc, OnceLock};

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDateTime;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::classify::Helpers;
use crate::error::{DailyStatusError, Result};
use crate::item::WorkItem;

pub type TemplateData = Map<String, Value>;

pub type TemplateFn = dyn Fn(&TemplateConfig, &SubRenderer<'_>, &TemplateData, &Helpers) -> Result<String>
    + Send
    + Sync;

pub type DateFn = dyn Fn(NaiveDateTime) -> String + Send + Sync;

pub const CONTAINER_SLOT: &str = "container";
pub const ITEM_SLOT: &str = "item";
pub const DATE_SLOT: &str = "date";

const DEFAULT_CONTAINER: &str = "\
## {{USER_LOGIN}}

**Current issues:**
{{CURRENT_ISSUES}}

**Next issues:**
{{TODO_ISSUES}}

**Status update:**

**PRs:**
{{CURRENT_PULL_REQUESTS}}";

const DEFAULT_ITEM: &str = "[#{{NUMBER}} ({{TITLE}})]({{URL}})";
const DEFAULT_DATE: &str = "\n# {{DATE}}\n";

#[derive(Clone)]
pub enum Template {
    Literal(String),
    Computed(Arc<TemplateFn>),
}

impl Template {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&TemplateConfig, &SubRenderer<'_>, &TemplateData, &Helpers) -> Result<String>
            + Send
            + Sync
            + 'static,
    {
        Template::Computed(Arc::new(f))
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Template::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for Template {
    fn from(value: &str) -> Self {
        Template::Literal(value.to_string())
    }
}

impl From<String> for Template {
    fn from(value: String) -> Self {
        Template::Literal(value)
    }
}

#[derive(Clone)]
pub enum DateFormat {
    /// A strftime pattern, e.g. `%d-%m-%Y`.
    Pattern(String),
    Computed(Arc<DateFn>),
}

impl fmt::Debug for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFormat::Pattern(p) => f.debug_tuple("Pattern").field(p).finish(),
            DateFormat::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateConfig {
    slots: BTreeMap<String, Template>,
    pub item_separator: String,
    pub person_separator: String,
    pub date_format: DateFormat,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(CONTAINER_SLOT.to_string(), DEFAULT_CONTAINER.into());
        slots.insert(ITEM_SLOT.to_string(), DEFAULT_ITEM.into());
        slots.insert(DATE_SLOT.to_string(), DEFAULT_DATE.into());
        Self {
            slots,
            item_separator: ";\n".to_string(),
            person_separator: "---".to_string(),
            date_format: DateFormat::Pattern("%d-%m-%Y".to_string()),
        }
    }
}

impl TemplateConfig {
    pub fn slot(&self, key: &str) -> Option<&Template> {
        self.slots.get(key)
    }

    pub fn set_slot(&mut self, key: impl Into<String>, template: impl Into<Template>) {
        self.slots.insert(key.into(), template.into());
    }

    pub fn with_slot(mut self, key: impl Into<String>, template: impl Into<Template>) -> Self {
        self.set_slot(key, template);
        self
    }

    /// Renders the slot named `key`; an undefined slot is a configuration error.
    pub fn render_slot(&self, key: &str, data: &TemplateData) -> Result<String> {
        let template = self
            .slot(key)
            .ok_or_else(|| DailyStatusError::UnknownTemplateSlot(key.to_string()))?;
        render(self, template, data)
    }
}

/// Looks up other slots on behalf of a callable template.
pub struct SubRenderer<'a> {
    config: &'a TemplateConfig,
}

impl SubRenderer<'_> {
    pub fn render(&self, key: &str, data: &TemplateData) -> Result<String> {
        self.config.render_slot(key, data)
    }
}

pub fn render(config: &TemplateConfig, template: &Template, data: &TemplateData) -> Result<String> {
    match template {
        Template::Literal(text) => Ok(render_literal(text, data)),
        Template::Computed(f) => {
            let sub = SubRenderer { config };
            f(config, &sub, data, &Helpers)
        }
    }
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"))
}

pub fn render_literal(template: &str, data: &TemplateData) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures<'_>| match data.get(&caps[1]) {
            Some(value) => value_text(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Renders each item through the `item` slot and joins them with the item separator.
pub fn render_list(config: &TemplateConfig, items: &[&WorkItem]) -> Result<String> {
    let rendered = items
        .iter()
        .map(|item| config.render_slot(ITEM_SLOT, &item.template_fields()))
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join(&config.item_separator))
}

pub fn format_date(format: &DateFormat, date: NaiveDateTime) -> Result<String> {
    match format {
        DateFormat::Computed(f) => Ok(f(date)),
        DateFormat::Pattern(pattern) => {
            let invalid = |reason: &str| DailyStatusError::InvalidConfig {
                key: "template.date_format".to_string(),
                reason: format!("{reason}: {pattern:?}"),
            };
            let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
            if items.iter().any(|item| matches!(item, Item::Error)) {
                return Err(invalid("unsupported format specifier"));
            }
            let mut out = String::new();
            write!(out, "{}", date.format_with_items(items.iter()))
                .map_err(|_| invalid("cannot format date"))?;
            Ok(out)
        }
    }
}

/// Renders the `date` slot for `date`.
pub fn render_date(config: &TemplateConfig, date: NaiveDateTime) -> Result<String> {
    let mut data = TemplateData::new();
    data.insert(
        "DATE".into(),
        Value::String(format_date(&config.date_format, date)?),
    );
    config.render_slot(DATE_SLOT, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn data(pairs: &[(&str, Value)]) -> TemplateData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn substitutes_every_occurrence() {
        let out = render_literal("{{A}}-{{B}}-{{A}}", &data(&[("A", json!("x")), ("B", json!(2))]));
        assert_eq!(out, "x-2-x");
    }

    #[test]
    fn unknown_placeholders_pass_through() {
        let out = render_literal("hi {{NAME}}, {{MISSING}}", &data(&[("NAME", json!("octo"))]));
        assert_eq!(out, "hi octo, {{MISSING}}");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let out = render_literal(
            "{{A}}",
            &data(&[("A", json!("{{B}}")), ("B", json!("nope"))]),
        );
        assert_eq!(out, "{{B}}");
    }

    #[test]
    fn computed_template_renders_other_slots() {
        let config = TemplateConfig::default()
            .with_slot("greeting", "hello {{WHO}}")
            .with_slot(
                "container",
                Template::computed(|_, t, data, _| {
                    let mut inner = TemplateData::new();
                    inner.insert("WHO".into(), data["USER_LOGIN"].clone());
                    Ok(format!("{}!", t.render("greeting", &inner)?))
                }),
            );
        let out = config
            .render_slot("container", &data(&[("USER_LOGIN", json!("octo"))]))
            .unwrap();
        assert_eq!(out, "hello octo!");
    }

    #[test]
    fn sub_renderer_rejects_unknown_slot() {
        let config = TemplateConfig::default().with_slot(
            "container",
            Template::computed(|_, t, _, _| t.render("nope", &TemplateData::new())),
        );
        let err = config
            .render_slot("container", &TemplateData::new())
            .unwrap_err();
        assert!(matches!(err, DailyStatusError::UnknownTemplateSlot(ref k) if k == "nope"));
    }

    #[test]
    fn renders_item_list_with_separator() {
        let items: Vec<WorkItem> = vec![
            serde_json::from_value(json!({
                "id": 1, "number": 7, "title": "Fix", "html_url": "https://x/7"
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "id": "ab12", "description": "notes", "html_url": "https://g/ab12",
                "git_pull_url": "https://g/ab12.git"
            }))
            .unwrap(),
        ];
        let refs: Vec<&WorkItem> = items.iter().collect();
        let out = render_list(&TemplateConfig::default(), &refs).unwrap();
        assert_eq!(out, "[#7 (Fix)](https://x/7);\n[#ab12 (notes)](https://g/ab12)");
        assert_eq!(render_list(&TemplateConfig::default(), &[]).unwrap(), "");
    }

    #[test]
    fn renders_date_with_pattern_and_function() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let mut config = TemplateConfig::default();
        assert_eq!(render_date(&config, date).unwrap(), "\n# 31-01-2024\n");

        config.date_format = DateFormat::Computed(Arc::new(|d: NaiveDateTime| d.format("%Y/%m").to_string()));
        assert_eq!(render_date(&config, date).unwrap(), "\n# 2024/01\n");
    }

    #[test]
    fn invalid_date_pattern_is_a_config_error() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let err = format_date(&DateFormat::Pattern("%Q".into()), date).unwrap_err();
        assert!(matches!(err, DailyStatusError::InvalidConfig { ref key, .. } if key == "template.date_format"));
    }
}
