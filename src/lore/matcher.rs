//! Keyword trigger matching for a single entry.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use super::types::IndexedEntry;

/// Scan text prepared once per pass so every entry shares the folded copy.
pub struct Haystack<'a> {
    raw: &'a str,
    folded: Cow<'a, str>,
}

impl<'a> Haystack<'a> {
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

/// Tests an entry's trigger keys against scan text.
///
/// Whole-word patterns are compiled on first use and reused for the life of
/// the matcher, which is one matching pass. `None` marks a key whose pattern
/// failed to compile.
#[derive(Debug)]
pub struct KeywordMatcher {
    pub case_sensitive: bool,
    pub whole_words: bool,
    patterns: RefCell<HashMap<String, Option<Regex>>>,
}

impl KeywordMatcher {
    pub fn new(case_sensitive: bool, whole_words: bool) -> Self {
        Self {
            case_sensitive,
            whole_words,
            patterns: RefCell::new(HashMap::new()),
        }
    }

    /// Prepare scan text for repeated [`test_prepared`](Self::test_prepared) calls.
    pub fn haystack<'a>(&self, text: &'a str) -> Haystack<'a> {
        let folded = if self.case_sensitive {
            Cow::Borrowed(text)
        } else {
            Cow::Owned(text.to_lowercase())
        };
        Haystack { raw: text, folded }
    }

    /// First of the entry's keys found in `scan_text`, with its original casing.
    pub fn test<'e>(&self, entry: &'e IndexedEntry, scan_text: &str) -> Option<&'e str> {
        self.test_prepared(entry, &self.haystack(scan_text))
    }

    pub fn test_prepared<'e>(
        &self,
        entry: &'e IndexedEntry,
        haystack: &Haystack<'_>,
    ) -> Option<&'e str> {
        entry
            .keys
            .iter()
            .filter(|key| !key.trim().is_empty())
            .find(|key| self.key_matches(key, haystack))
            .map(String::as_str)
    }

    fn key_matches(&self, key: &str, haystack: &Haystack<'_>) -> bool {
        if self.whole_words {
            let mut patterns = self.patterns.borrow_mut();
            patterns
                .entry(key.to_string())
                .or_insert_with(|| self.compile(key))
                .as_ref()
                .is_some_and(|re| re.is_match(haystack.raw))
        } else if self.case_sensitive {
            haystack.folded.contains(key)
        } else {
            haystack.folded.contains(key.to_lowercase().as_str())
        }
    }

    fn compile(&self, key: &str) -> Option<Regex> {
        let pattern = format!(r"\b{}\b", regex::escape(key));
        match RegexBuilder::new(&pattern)
            .case_insensitive(!self.case_sensitive)
            .build()
        {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(key, error = %e, "skipping keyword that does not compile");
                None
            }
        }
    }

    #[cfg(test)]
    fn compiled_patterns(&self) -> usize {
        self.patterns.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lore::types::DEFAULT_PRIORITY;

    fn entry(keys: &[&str]) -> IndexedEntry {
        IndexedEntry {
            path: "test.md".into(),
            title: "test".into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            content: String::new(),
            priority: DEFAULT_PRIORITY,
            constant: false,
            token_estimate: 1,
            scan_depth_override: None,
            exclude_from_recursion: false,
        }
    }

    #[test]
    fn case_insensitive_substring() {
        let e = entry(&["Eris"]);
        let m = KeywordMatcher::new(false, false);
        assert_eq!(m.test(&e, "I met eris today"), Some("Eris"));

        let strict = KeywordMatcher::new(true, false);
        assert_eq!(strict.test(&e, "I met eris today"), None);
        assert_eq!(strict.test(&e, "I met Eris today"), Some("Eris"));
    }

    #[test]
    fn whole_word_respects_boundaries() {
        let e = entry(&["war"]);
        let m = KeywordMatcher::new(false, true);
        assert_eq!(m.test(&e, "warning"), None);
        assert_eq!(m.test(&e, "the war began"), Some("war"));
        assert_eq!(m.test(&e, "The WAR began"), Some("war"));

        let substring = KeywordMatcher::new(false, false);
        assert_eq!(substring.test(&e, "warning"), Some("war"));
    }

    #[test]
    fn whole_word_case_sensitive() {
        let e = entry(&["Eris"]);
        let m = KeywordMatcher::new(true, true);
        assert_eq!(m.test(&e, "eris"), None);
        assert_eq!(m.test(&e, "Eris."), Some("Eris"));
    }

    #[test]
    fn metacharacters_are_literal() {
        let e = entry(&["a.b", "(x)"]);
        let m = KeywordMatcher::new(false, true);
        assert_eq!(m.test(&e, "axb"), None);
        assert_eq!(m.test(&e, "see a.b now"), Some("a.b"));

        let substring = KeywordMatcher::new(false, false);
        assert_eq!(substring.test(&e, "call f(x) here"), Some("(x)"));
    }

    #[test]
    fn whole_word_patterns_compile_once_per_key() {
        let eris = entry(&["Eris", "discord"]);
        let also_eris = entry(&["Eris"]);
        let m = KeywordMatcher::new(false, true);
        let haystack = m.haystack("nothing relevant here");

        for _ in 0..3 {
            assert_eq!(m.test_prepared(&eris, &haystack), None);
            assert_eq!(m.test_prepared(&also_eris, &haystack), None);
        }
        assert_eq!(m.compiled_patterns(), 2);

        let substring = KeywordMatcher::new(false, false);
        assert_eq!(substring.test(&eris, "nothing"), None);
        assert_eq!(substring.compiled_patterns(), 0);
    }

    #[test]
    fn first_declared_key_wins() {
        let e = entry(&["dragon", "Thera"]);
        let m = KeywordMatcher::new(false, false);
        assert_eq!(m.test(&e, "Thera has a dragon"), Some("dragon"));
    }

    #[test]
    fn empty_and_blank_keys_never_match() {
        let m = KeywordMatcher::new(false, false);
        assert_eq!(m.test(&entry(&[]), "anything at all"), None);
        assert_eq!(m.test(&entry(&["", "  "]), "anything at all"), None);
    }
}
