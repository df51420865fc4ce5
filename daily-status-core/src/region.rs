//! Sentinel-delimited regions inside the shared page.
//!
//! Each writer owns a region bounded by two invisible anchor lines:
//!
//! ```text
//! <a href="#daily-status-meta-user-42-start"></a>
//! ...contributor 42's status...
//! <a href="#daily-status-meta-user-42-end"></a>
//! ```
//!
//! A region is found by exact line match (surrounding whitespace ignored) and
//! replaced as a whole. Lines outside it are never touched, which is what
//! lets several contributors update the same page independently. An unpaired
//! or repeated sentinel is reported as [`DailyStatusError::MalformedRegion`];
//! the codec never guesses a boundary.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{DailyStatusError, Result};

/// Marks the end of what gets committed in a draft. Everything after it is reference only.
pub const SCRATCH_SEPARATOR: &str =
    "##################  Nothing below will be commited  ##################";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKey {
    Date,
    User(u64),
}

impl RegionKey {
    pub fn start_marker(&self) -> String {
        render_meta_line(&format!("{self}-start"))
    }

    pub fn end_marker(&self) -> String {
        render_meta_line(&format!("{self}-end"))
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKey::Date => f.write_str("date"),
            RegionKey::User(id) => write!(f, "user-{id}"),
        }
    }
}

pub fn render_meta_line(key: &str) -> String {
    format!("<a href=\"#daily-status-meta-{key}\"></a>")
}

/// Returns the key of a sentinel line, e.g. `user-42-start`.
pub fn parse_meta_line(line: &str) -> Option<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r##"<a href="#daily-status-meta-(.+?)"></a>"##).expect("meta line pattern is valid")
    });
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Where a region goes when the document does not contain it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Append,
    Prepend,
}

/// Line indices of the start and end sentinels, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn inner(&self) -> std::ops::Range<usize> {
        self.start + 1..self.end
    }
}

/// The shared page as lines. Operations return a new document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    lines: Vec<String>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn find_region(&self, key: RegionKey) -> Result<Option<Region>> {
        let start_marker = key.start_marker();
        let end_marker = key.end_marker();
        let positions = |marker: &str| -> Vec<usize> {
            self.lines
                .iter()
                .enumerate()
                .filter(|(_, line)| line.trim() == marker)
                .map(|(i, _)| i)
                .collect()
        };
        let starts = positions(&start_marker);
        let ends = positions(&end_marker);
        let name = key.to_string();

        match (starts.as_slice(), ends.as_slice()) {
            ([], []) => Ok(None),
            ([start], [end]) if start < end => Ok(Some(Region {
                start: *start,
                end: *end,
            })),
            ([_], [_]) => Err(DailyStatusError::malformed(
                &name,
                "end marker comes before start marker",
            )),
            (_, []) => Err(DailyStatusError::malformed(&name, "could not find the end marker")),
            ([], _) => Err(DailyStatusError::malformed(&name, "could not find the start marker")),
            _ => Err(DailyStatusError::malformed(&name, "marker appears more than once")),
        }
    }

    /// Inner lines of the region, without its sentinels.
    pub fn region_lines(&self, key: RegionKey) -> Result<Option<&[String]>> {
        Ok(self.find_region(key)?.map(|r| &self.lines[r.inner()]))
    }

    /// Replaces the region in place, or appends it when the document has none.
    pub fn replace_region<S: AsRef<str>>(&self, key: RegionKey, inner: &[S]) -> Result<Document> {
        self.replace_region_with(key, inner, Placement::Append)
    }

    pub fn replace_region_with<S: AsRef<str>>(
        &self,
        key: RegionKey,
        inner: &[S],
        placement: Placement,
    ) -> Result<Document> {
        let mut block = Vec::with_capacity(inner.len() + 2);
        block.push(key.start_marker());
        block.extend(inner.iter().map(|l| l.as_ref().to_string()));
        block.push(key.end_marker());

        match self.find_region(key)? {
            Some(region) => {
                let mut lines = self.lines.clone();
                lines.splice(region.start..=region.end, block);
                let joined = lines.join("\n");
                Ok(Document::parse(joined.trim_end()))
            }
            None => {
                let lines = match placement {
                    Placement::Append => self.lines.iter().cloned().chain(block).collect(),
                    Placement::Prepend => block.into_iter().chain(self.lines.iter().cloned()).collect(),
                };
                Ok(Document { lines })
            }
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

/// Drops the separator line and everything after it. Text without one is returned unchanged.
pub fn strip_scratch_trailer(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    match lines.iter().position(|l| l.trim() == SCRATCH_SEPARATOR) {
        Some(index) => lines[..index].join("\n"),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(lines: &[&str]) -> Document {
        Document::from_lines(lines.iter().copied())
    }

    #[test]
    fn markers_round_trip() {
        let key = RegionKey::User(42);
        assert_eq!(
            key.start_marker(),
            r##"<a href="#daily-status-meta-user-42-start"></a>"##
        );
        assert_eq!(parse_meta_line(key.end_marker().as_str()), Some("user-42-end"));
        assert_eq!(parse_meta_line("  <a href=\"#daily-status-meta-date-start\"></a> "), Some("date-start"));
        assert_eq!(parse_meta_line("# heading"), None);
    }

    #[test]
    fn replaces_date_region_in_place() {
        let date = RegionKey::Date;
        let d = doc(&["pre", date.start_marker().as_str(), "# old", date.end_marker().as_str(), "post"]);
        let out = d.replace_region(date, &["# 2024-01-01"]).unwrap();
        assert_eq!(
            out,
            doc(&["pre", date.start_marker().as_str(), "# 2024-01-01", date.end_marker().as_str(), "post"])
        );
    }

    #[test]
    fn finds_markers_with_surrounding_whitespace() {
        let key = RegionKey::User(1);
        let d = doc(&[format!("  {}", key.start_marker()).as_str(), "x", format!("{}\t", key.end_marker()).as_str()]);
        assert_eq!(d.find_region(key).unwrap(), Some(Region { start: 0, end: 2 }));
    }

    #[test]
    fn appends_when_absent_without_touching_existing_text() {
        let key = RegionKey::User(7);
        let d = Document::parse("# Status\n\n");
        let out = d.replace_region(key, &["hello"]).unwrap();
        assert_eq!(
            out.to_string(),
            format!("# Status\n\n\n{}\nhello\n{}", key.start_marker(), key.end_marker())
        );
    }

    #[test]
    fn prepends_when_asked() {
        let d = Document::parse("body");
        let out = d
            .replace_region_with(RegionKey::Date, &["# today"], Placement::Prepend)
            .unwrap();
        assert_eq!(out.lines()[0], RegionKey::Date.start_marker());
        assert_eq!(out.lines().last().unwrap(), "body");
    }

    #[test]
    fn in_place_replacement_trims_trailing_whitespace() {
        let key = RegionKey::User(3);
        let d = Document::parse(&format!("{}\nold\n{}\n\n  \n", key.start_marker(), key.end_marker()));
        let out = d.replace_region(key, &["new"]).unwrap();
        assert!(out.to_string().ends_with(key.end_marker().as_str()));
    }

    #[test]
    fn replacing_twice_is_idempotent() {
        let key = RegionKey::User(9);
        let d = Document::parse("intro\n\nsome text\n");
        let once = d.replace_region(key, &["a", "", "b"]).unwrap();
        let twice = once.replace_region(key, &["a", "", "b"]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn replacing_one_region_leaves_another_alone() {
        let alice = RegionKey::User(1);
        let bob = RegionKey::User(2);
        let d = doc(&[
            "top",
            alice.start_marker().as_str(),
            "alice old",
            alice.end_marker().as_str(),
            "middle",
            bob.start_marker().as_str(),
            "bob's status",
            bob.end_marker().as_str(),
            "bottom",
        ]);
        let out = d.replace_region(alice, &["alice new", "more"]).unwrap();
        assert_eq!(out.region_lines(bob).unwrap().unwrap(), ["bob's status"]);
        assert_eq!(out.lines()[0], "top");
        assert_eq!(out.lines()[5], "middle");
        assert_eq!(out.lines().last().unwrap(), "bottom");
    }

    #[test]
    fn find_after_replace_returns_new_content() {
        let key = RegionKey::Date;
        let d = Document::parse("x");
        let out = d.replace_region(key, &["l1", "l2"]).unwrap();
        assert_eq!(out.region_lines(key).unwrap().unwrap(), ["l1", "l2"]);
    }

    #[test]
    fn unpaired_markers_fail_fast() {
        let key = RegionKey::User(5);
        let only_start = doc(&["a", key.start_marker().as_str(), "b"]);
        let only_end = doc(&["a", key.end_marker().as_str()]);
        let inverted = doc(&[key.end_marker().as_str(), "x", key.start_marker().as_str()]);
        let doubled = doc(&[key.start_marker().as_str(), key.end_marker().as_str(), key.start_marker().as_str(), key.end_marker().as_str()]);

        for d in [only_start, only_end, inverted, doubled] {
            let err = d.replace_region(key, &["new"]).unwrap_err();
            assert!(
                matches!(err, DailyStatusError::MalformedRegion { ref key, .. } if key == "user-5"),
                "unexpected error: {err:?}"
            );
        }
    }

    #[test]
    fn scratch_trailer_is_stripped() {
        let text = format!("mine\nmore\n{SCRATCH_SEPARATOR}\n\nother stuff");
        assert_eq!(strip_scratch_trailer(&text), "mine\nmore");
        assert_eq!(strip_scratch_trailer("no separator\n"), "no separator\n");
        assert_eq!(strip_scratch_trailer(&format!("{SCRATCH_SEPARATOR}\nx")), "");
    }
}
