//! Frontmatter extraction for vault documents.
//!
//! Recognizes a `---`-delimited block at the very top of a document and
//! classifies each line as either a `key: value` field or a `- item` sequence
//! entry. This is a line scanner for the two shapes lore notes actually use,
//! not a YAML parser: anything else inside the block is skipped.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Line that opens and closes a frontmatter block.
pub const MARKER: &str = "---";

static KEY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w-]+):\s*(.*)$").expect("valid key pattern"));

static ITEM_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s*(.+)$").expect("valid item pattern"));

/// A typed frontmatter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontmatterValue {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
}

impl FrontmatterValue {
    /// Type a trimmed scalar by precedence: empty/`[]` → list, bool, all-digit int, string.
    fn from_scalar(raw: &str) -> Self {
        match raw {
            "" | "[]" => Self::List(Vec::new()),
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ if raw.bytes().all(|b| b.is_ascii_digit()) => match raw.parse() {
                Ok(n) => Self::Int(n),
                Err(_) => Self::Str(raw.to_string()),
            },
            _ => Self::Str(strip_quotes(raw).to_string()),
        }
    }
}

/// Parsed metadata block, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    fields: BTreeMap<String, FrontmatterValue>,
}

impl Frontmatter {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, key: &str) -> Option<&FrontmatterValue> {
        self.fields.get(key)
    }

    /// First field present among `keys` (used for spelling aliases).
    pub fn get_any(&self, keys: &[&str]) -> Option<&FrontmatterValue> {
        keys.iter().find_map(|k| self.fields.get(*k))
    }

    pub fn bool(&self, keys: &[&str]) -> Option<bool> {
        match self.get_any(keys)? {
            FrontmatterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn int(&self, keys: &[&str]) -> Option<i64> {
        match self.get_any(keys)? {
            FrontmatterValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Sequence items for a field. A scalar string is split on commas, with one
    /// pair of surrounding brackets (`[a, b]`) ignored and quotes stripped from
    /// each item; other scalars are stringified as a single item.
    pub fn list(&self, keys: &[&str]) -> Vec<String> {
        match self.get_any(keys) {
            Some(FrontmatterValue::List(items)) => items.clone(),
            Some(FrontmatterValue::Str(s)) => s
                .strip_prefix('[')
                .and_then(|inner| inner.strip_suffix(']'))
                .unwrap_or(s)
                .split(',')
                .map(|item| strip_quotes(item.trim()).trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Some(FrontmatterValue::Int(n)) => vec![n.to_string()],
            Some(FrontmatterValue::Bool(b)) => vec![b.to_string()],
            None => Vec::new(),
        }
    }

    fn insert(&mut self, key: &str, value: FrontmatterValue) {
        self.fields.insert(key.to_string(), value);
    }

    fn push_item(&mut self, key: &str, item: String) {
        match self.fields.get_mut(key) {
            Some(FrontmatterValue::List(items)) => items.push(item),
            _ => self.insert(key, FrontmatterValue::List(vec![item])),
        }
    }
}

/// Where the line classifier is within the block.
enum LineState {
    /// Waiting for a `key: value` line; `current` is the last key seen, if any.
    ExpectKey { current: Option<String> },
    /// `- item` lines append to `key`'s sequence.
    InSequence { key: String },
}

/// Split a document into its frontmatter and body.
///
/// Never fails: without a well-formed block the frontmatter is empty and the
/// body is the input, verbatim.
pub fn parse(text: &str) -> (Frontmatter, &str) {
    let Some((block, body)) = split_block(text) else {
        return (Frontmatter::default(), text);
    };
    (parse_block(block), body)
}

/// Locate the block between the opening and closing marker lines.
fn split_block(text: &str) -> Option<(&str, &str)> {
    let (first, rest) = next_line(text)?;
    if first != MARKER {
        return None;
    }

    let mut offset = 0;
    let mut remaining = rest;
    while let Some((line, tail)) = next_line(remaining) {
        if line == MARKER {
            let block = &rest[..offset];
            return Some((block, tail));
        }
        offset += remaining.len() - tail.len();
        remaining = tail;
    }
    None
}

/// Split off one line, with its `\n` and any trailing `\r` removed.
/// Returns `None` once the input is exhausted.
fn next_line(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    let (line, tail) = match text.find('\n') {
        Some(i) => (&text[..i], &text[i + 1..]),
        None => (text, ""),
    };
    Some((line.strip_suffix('\r').unwrap_or(line), tail))
}

fn parse_block(block: &str) -> Frontmatter {
    let mut fm = Frontmatter::default();
    let mut state = LineState::ExpectKey { current: None };

    for raw_line in block.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some(caps) = KEY_LINE.captures(line) {
            let key = caps[1].to_string();
            let value = FrontmatterValue::from_scalar(caps[2].trim());
            let opens_sequence = matches!(value, FrontmatterValue::List(_));
            fm.insert(&key, value);
            state = if opens_sequence {
                LineState::InSequence { key }
            } else {
                LineState::ExpectKey { current: Some(key) }
            };
            continue;
        }

        if let Some(caps) = ITEM_LINE.captures(line) {
            let item = strip_quotes(caps[1].trim()).to_string();
            state = match state {
                LineState::InSequence { key } => {
                    fm.push_item(&key, item);
                    LineState::InSequence { key }
                }
                LineState::ExpectKey { current: Some(key) } => {
                    fm.insert(&key, FrontmatterValue::List(vec![item]));
                    LineState::InSequence { key }
                }
                unkeyed @ LineState::ExpectKey { current: None } => unkeyed,
            };
        }
    }

    fm
}

/// Strip one layer of matching surrounding quotes.
fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}
