//! Keyword matching over the dialogue window plus bounded recursive expansion.
//!
//! Step 0 scans the dialogue. Each later step scans only the content of the
//! entries discovered in the step before it (the frontier), so an entry can
//! pull in other entries whose keys its text mentions. Expansion stops when a
//! step finds nothing new or the step cap is reached, which bounds the work
//! even when entries reference each other in a cycle.

use std::collections::{BTreeSet, HashMap};

use super::matcher::KeywordMatcher;
use super::types::{render_window, DialogueTurn, IndexedEntry};

/// Reason recorded for entries selected without matching.
pub const CONSTANT_REASON: &str = "(constant)";

/// Knobs for one matching pass.
#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    /// Trailing dialogue turns scanned when an entry has no override.
    pub scan_depth: usize,
    pub case_sensitive: bool,
    pub whole_words: bool,
    pub recursive: bool,
    pub max_recursion_steps: usize,
}

impl ScanSettings {
    fn matcher(&self) -> KeywordMatcher {
        KeywordMatcher::new(self.case_sensitive, self.whole_words)
    }
}

/// Entries selected for a request, sorted ascending by priority.
#[derive(Debug, Default)]
pub struct MatchResult<'a> {
    pub entries: Vec<&'a IndexedEntry>,
    /// Keyed by entry path.
    pub reasons: HashMap<String, String>,
}

impl<'a> MatchResult<'a> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reason_for(&self, entry: &IndexedEntry) -> Option<&str> {
        self.reasons.get(&entry.path).map(String::as_str)
    }
}

/// A hit found during one step: entry index and the reason it was selected.
type Hit = (usize, String);

/// Step 0: constants plus every entry whose keys appear in its scan window.
pub fn initial_matches(
    entries: &[IndexedEntry],
    settings: &ScanSettings,
    window: &[DialogueTurn],
) -> Vec<Hit> {
    let matcher = settings.matcher();
    let mut rendered: HashMap<usize, String> = HashMap::new();
    let mut hits = Vec::new();

    for (idx, entry) in entries.iter().enumerate() {
        if entry.constant {
            hits.push((idx, CONSTANT_REASON.to_string()));
            continue;
        }
        if entry.keys.is_empty() {
            continue;
        }

        let depth = entry.scan_depth_override.unwrap_or(settings.scan_depth);
        let text = rendered
            .entry(depth)
            .or_insert_with(|| render_window(window, depth));
        if text.trim().is_empty() {
            continue;
        }

        if let Some(key) = matcher.test(entry, text.as_str()) {
            hits.push((idx, key.to_string()));
        }
    }

    hits
}

/// Grow `initial` through recursive scans and return the priority-sorted result.
pub fn expand<'a>(
    initial: Vec<Hit>,
    entries: &'a [IndexedEntry],
    settings: &ScanSettings,
) -> MatchResult<'a> {
    let mut reasons: HashMap<usize, String> = HashMap::new();
    let mut matched: BTreeSet<usize> = BTreeSet::new();
    let mut frontier: Vec<usize> = Vec::with_capacity(initial.len());

    for (idx, reason) in initial {
        if matched.insert(idx) {
            reasons.insert(idx, reason);
            frontier.push(idx);
        }
    }

    if settings.recursive {
        let matcher = settings.matcher();
        let mut step = 0;
        while step < settings.max_recursion_steps && !frontier.is_empty() {
            step += 1;
            let hits = recursion_step(entries, &matched, &frontier, &matcher, step);
            if hits.is_empty() {
                tracing::debug!(step, "recursion found nothing new");
                break;
            }

            let discovered: BTreeSet<usize> = hits.iter().map(|(idx, _)| *idx).collect();
            tracing::debug!(step, discovered = discovered.len(), "recursion step matched");
            matched = &matched | &discovered;
            frontier = discovered.into_iter().collect();
            reasons.extend(hits);
        }
    }

    let mut ordered: Vec<usize> = matched.into_iter().collect();
    ordered.sort_by_key(|&idx| entries[idx].priority);

    MatchResult {
        entries: ordered.iter().map(|&idx| &entries[idx]).collect(),
        reasons: reasons
            .into_iter()
            .map(|(idx, reason)| (entries[idx].path.clone(), reason))
            .collect(),
    }
}

/// One BFS step: scan the frontier's content for entries not yet matched.
fn recursion_step(
    entries: &[IndexedEntry],
    matched: &BTreeSet<usize>,
    frontier: &[usize],
    matcher: &KeywordMatcher,
    step: usize,
) -> Vec<Hit> {
    let source = frontier
        .iter()
        .map(|&idx| &entries[idx])
        .filter(|entry| !entry.exclude_from_recursion)
        .map(|entry| entry.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let haystack = matcher.haystack(&source);
    if haystack.is_blank() {
        return Vec::new();
    }

    entries
        .iter()
        .enumerate()
        .filter(|(idx, entry)| !entry.constant && !matched.contains(idx))
        .filter_map(|(idx, entry)| {
            matcher
                .test_prepared(entry, &haystack)
                .map(|key| (idx, format!("{key} (recursion step {step})")))
        })
        .collect()
}

/// Run step 0 and the recursive expansion in one call.
pub fn find_matches<'a>(
    entries: &'a [IndexedEntry],
    settings: &ScanSettings,
    window: &[DialogueTurn],
) -> MatchResult<'a> {
    let initial = initial_matches(entries, settings, window);
    expand(initial, entries, settings)
}
