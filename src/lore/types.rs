//! Core lorebook type definitions.
//!
//! Defines [`RawDocument`] (source input), [`IndexedEntry`] (the unit of
//! retrieval), [`Index`] (one published generation of entries), and
//! [`DialogueTurn`] (a single line of the conversation being scanned).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority assigned to entries whose frontmatter does not set one.
pub const DEFAULT_PRIORITY: i64 = 100;

/// A document as delivered by a [`DocumentSource`](crate::source::DocumentSource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Vault-relative path, `/`-separated (e.g. `"People/Eris.md"`).
    pub path: String,
    /// Full file contents, frontmatter included.
    pub content: String,
}

impl RawDocument {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A lore entry after parsing, filtering, and sanitization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEntry {
    /// Unique key within one index generation.
    pub path: String,
    /// Display title: first level-1 heading, else the file stem.
    pub title: String,
    /// Trigger keywords, tried in declared order. Empty means keyword matching never fires.
    pub keys: Vec<String>,
    /// Sanitized body text, frontmatter removed.
    pub content: String,
    /// Lower sorts first.
    pub priority: i64,
    /// Always selected, bypassing keyword matching.
    pub constant: bool,
    /// Cost of this entry against the token budget.
    pub token_estimate: usize,
    /// Per-entry number of trailing dialogue turns to scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_depth_override: Option<usize>,
    /// If set, this entry's content is never used as a recursion source.
    pub exclude_from_recursion: bool,
}

/// One published generation of lore entries.
#[derive(Debug, Clone)]
pub struct Index {
    pub entries: Vec<IndexedEntry>,
    pub built_at: DateTime<Utc>,
}

impl Index {
    /// Number of entries flagged `constant`.
    pub fn constant_count(&self) -> usize {
        self.entries.iter().filter(|e| e.constant).count()
    }

    /// Sum of every entry's token estimate.
    pub fn total_tokens(&self) -> usize {
        self.entries.iter().map(|e| e.token_estimate).sum()
    }

    /// Whole seconds elapsed between `built_at` and `now`.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.built_at).num_seconds()
    }
}

/// A single turn of the conversation being scanned for keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub speaker: String,
    pub text: String,
}

impl DialogueTurn {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

impl std::str::FromStr for DialogueTurn {
    type Err = String;

    /// Parses `"speaker: text"`. A line without a colon is attributed to `"user"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("dialogue turn must not be empty".into());
        }
        match s.split_once(':') {
            Some((speaker, text)) if !speaker.trim().is_empty() && !speaker.contains(' ') => {
                Ok(Self::new(speaker.trim(), text.trim()))
            }
            _ => Ok(Self::new("user", s.trim())),
        }
    }
}

/// Render the trailing `depth` turns of a dialogue window as scan text.
///
/// Only the turn text is scanned; speaker names are not part of the haystack.
pub fn render_window(window: &[DialogueTurn], depth: usize) -> String {
    let start = window.len().saturating_sub(depth);
    window[start..]
        .iter()
        .map(|turn| turn.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_window_takes_trailing_turns() {
        let window = vec![
            DialogueTurn::new("user", "one"),
            DialogueTurn::new("char", "two"),
            DialogueTurn::new("user", "three"),
        ];
        assert_eq!(render_window(&window, 2), "two\nthree");
        assert_eq!(render_window(&window, 10), "one\ntwo\nthree");
        assert_eq!(render_window(&window, 0), "");
    }

    #[test]
    fn dialogue_turn_from_str() {
        let turn: DialogueTurn = "Eris: hello there".parse().unwrap();
        assert_eq!(turn, DialogueTurn::new("Eris", "hello there"));

        let bare: DialogueTurn = "no speaker here".parse().unwrap();
        assert_eq!(bare.speaker, "user");
        assert_eq!(bare.text, "no speaker here");

        assert!("   ".parse::<DialogueTurn>().is_err());
    }
}
