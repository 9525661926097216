// Strategy notes keyed by zone and level range, rendered from Markdown to HTML.

use std::collections::HashMap;
use std::path::Path;

use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use serde::Deserialize;

use crate::error::NotesError;

/// Notes shipped with the binary: the group's plan for acts 1 to 3.
const BUILTIN_NOTES: &str = include_str!("../data/act_notes.toml");

/// One note, shown while the character is in any of `zones` at a level in
/// `min_level..=max_level`.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteRule {
    pub zones: Vec<String>,
    #[serde(default)]
    pub min_level: u32,
    #[serde(default = "max_level_default")]
    pub max_level: u32,
    pub markdown: String,
}

fn max_level_default() -> u32 {
    100
}

impl NoteRule {
    pub fn matches(&self, zone: &str, level: u32) -> bool {
        (self.min_level..=self.max_level).contains(&level) && self.zones.iter().any(|z| z == zone)
    }
}

#[derive(Deserialize)]
struct NoteFile {
    #[serde(default, rename = "note")]
    notes: Vec<NoteRule>,
}

/// Ordered set of note rules.
#[derive(Debug, Clone, Default)]
pub struct NoteBook {
    rules: Vec<NoteRule>,
}

impl NoteBook {
    pub fn new(rules: Vec<NoteRule>) -> Self {
        Self { rules }
    }

    /// The notes compiled into the binary.
    pub fn builtin() -> Result<Self, NotesError> {
        Self::from_toml(BUILTIN_NOTES)
    }

    /// Load notes from a TOML file of `[[note]]` tables.
    pub fn from_file(path: &Path) -> Result<Self, NotesError> {
        let contents = std::fs::read_to_string(path).map_err(|source| NotesError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, NotesError> {
        let file: NoteFile = toml::from_str(contents)?;
        for (index, rule) in file.notes.iter().enumerate() {
            if rule.min_level > rule.max_level {
                return Err(NotesError::InvertedRange {
                    index,
                    min: rule.min_level,
                    max: rule.max_level,
                });
            }
        }
        Ok(Self::new(file.notes))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Markdown of every matching rule in declaration order, separated by blank lines.
    pub fn matching_markdown(&self, zone: &str, level: u32) -> Option<String> {
        let matched: Vec<&str> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(zone, level))
            .map(|rule| rule.markdown.as_str())
            .collect();

        if matched.is_empty() {
            None
        } else {
            Some(matched.join("\n\n"))
        }
    }

    /// HTML for the notes matching `zone` and `level`, or `None` if no rule matches.
    pub fn render(&self, zone: &str, level: u32) -> Option<String> {
        self.matching_markdown(zone, level)
            .map(|markdown| markdown_to_html(&markdown))
    }
}

/// Render note Markdown. Headings get an `id`: the explicit `{#id}` when given,
/// otherwise one derived from the heading text.
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_HEADING_ATTRIBUTES;
    let mut events: Vec<Event<'_>> = Parser::new_ext(markdown, options).collect();
    assign_heading_ids(&mut events);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for i in 0..events.len() {
        let Event::Start(Tag::Heading { id: None, .. }) = &events[i] else {
            continue;
        };
        let text: String = events[i + 1..]
            .iter()
            .take_while(|e| !matches!(e, Event::End(TagEnd::Heading(_))))
            .filter_map(|e| match e {
                Event::Text(t) | Event::Code(t) => Some(&**t),
                _ => None,
            })
            .collect();

        let base = anchor_name(&text);
        if base.is_empty() {
            continue;
        }
        // Repeated headings become `name`, `name-1`, `name-2`, ...
        let count = seen.entry(base.clone()).or_insert(0);
        let anchor = if *count == 0 {
            base
        } else {
            format!("{base}-{count}")
        };
        *count += 1;

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(anchor.into());
        }
    }
}

/// Lowercase letters and digits, with every other run of characters collapsed
/// to a single `-`.
fn anchor_name(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut gap = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if gap && !out.is_empty() {
                out.push('-');
            }
            gap = false;
            out.extend(c.to_lowercase());
        } else {
            gap = true;
        }
    }
    out
}
