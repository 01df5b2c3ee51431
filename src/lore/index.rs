//! Index construction and caching.
//!
//! [`IndexStore`] holds the currently published [`Index`] and guarantees that
//! only one rebuild runs at a time. [`VaultIndexer`] owns a store plus the
//! collaborators needed to rebuild it: a document source and a token counter.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};

use super::frontmatter::{self, Frontmatter};
use super::sanitize::{resolve_title_with, sanitize};
use super::types::{Index, IndexedEntry, RawDocument, DEFAULT_PRIORITY};
use crate::config::{LorebookConfig, SourceConfig, TokenConfig};
use crate::error::{LoreError, LoreResult};
use crate::source::DocumentSource;
use crate::tokens::{estimate_tokens, TokenCounter};

const TAGS_FIELD: &[&str] = &["tags"];
const KEYS_FIELD: &[&str] = &["keys"];
const PRIORITY_FIELD: &[&str] = &["priority"];
const CONSTANT_FIELD: &[&str] = &["constant"];
const ENABLED_FIELD: &[&str] = &["enabled"];
const SCAN_DEPTH_FIELD: &[&str] = &["scanDepth", "scan-depth", "scan_depth"];
const EXCLUDE_RECURSION_FIELD: &[&str] =
    &["excludeRecursion", "exclude-recursion", "exclude_recursion"];

/// Longest TTL honoured; anything above is treated as this.
const MAX_TTL_SECS: u64 = 1 << 40;

/// Result of asking the store to rebuild.
#[derive(Debug, Clone)]
pub enum RebuildOutcome {
    /// The new index was published.
    Rebuilt(Arc<Index>),
    /// Another rebuild was in flight; nothing changed.
    AlreadyRunning,
}

/// Holder of the published index.
///
/// The index is swapped wholesale behind an `Arc`; readers keep whatever
/// snapshot they took even if a rebuild publishes a new one meanwhile.
#[derive(Debug, Default)]
pub struct IndexStore {
    current: RwLock<Option<Arc<Index>>>,
    rebuilding: AtomicBool,
}

/// Clears the rebuilding flag when the rebuild finishes, fails, or is dropped.
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently published index, if any.
    pub fn snapshot(&self) -> Option<Arc<Index>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    /// Run `build` and publish its index, unless a rebuild is already running.
    ///
    /// On error the previously published index stays in place.
    pub async fn rebuild<F, Fut>(&self, build: F) -> LoreResult<RebuildOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LoreResult<Index>>,
    {
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("rebuild already in flight, skipping");
            return Ok(RebuildOutcome::AlreadyRunning);
        }
        let _guard = RebuildGuard(&self.rebuilding);

        let index = Arc::new(build().await?);
        self.publish(Arc::clone(&index));
        Ok(RebuildOutcome::Rebuilt(index))
    }

    fn publish(&self, index: Arc<Index>) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(index);
    }
}

/// Whether an index built at `built_at` has outlived `ttl_secs` at `now`.
/// A TTL of 0 never expires.
pub fn is_stale(built_at: DateTime<Utc>, now: DateTime<Utc>, ttl_secs: u64) -> bool {
    if ttl_secs == 0 {
        return false;
    }
    let ttl = Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64);
    now - built_at > ttl
}

/// Which documents become entries and how they are read.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub include_tag: String,
    pub always_tag: String,
    pub never_tag: String,
    pub extension: String,
    /// Entries whose token cost is computed concurrently.
    pub batch_size: usize,
}

impl IndexSettings {
    pub fn from_config(
        lorebook: &LorebookConfig,
        source: &SourceConfig,
        tokens: &TokenConfig,
    ) -> Self {
        Self {
            include_tag: lorebook.include_tag.clone(),
            always_tag: lorebook.always_tag.clone(),
            never_tag: lorebook.never_tag.clone(),
            extension: source.extension.clone(),
            batch_size: tokens.batch_size,
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self::from_config(
            &LorebookConfig::default(),
            &SourceConfig::default(),
            &TokenConfig::default(),
        )
    }
}

/// Builds indexes from a document source and caches the latest one.
pub struct VaultIndexer {
    store: IndexStore,
    source: Arc<dyn DocumentSource>,
    counter: Arc<dyn TokenCounter>,
    settings: IndexSettings,
}

impl VaultIndexer {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        counter: Arc<dyn TokenCounter>,
        settings: IndexSettings,
    ) -> Self {
        Self {
            store: IndexStore::new(),
            source,
            counter,
            settings,
        }
    }

    pub fn snapshot(&self) -> Option<Arc<Index>> {
        self.store.snapshot()
    }

    pub fn is_rebuilding(&self) -> bool {
        self.store.is_rebuilding()
    }

    /// Fetch, parse, and publish a fresh index.
    pub async fn rebuild(&self) -> LoreResult<RebuildOutcome> {
        let outcome = self.store.rebuild(|| self.build_index()).await;
        match &outcome {
            Ok(RebuildOutcome::Rebuilt(index)) => tracing::info!(
                entries = index.entries.len(),
                constants = index.constant_count(),
                tokens = index.total_tokens(),
                "lore index rebuilt"
            ),
            Ok(RebuildOutcome::AlreadyRunning) => {}
            Err(e) => tracing::warn!(error = %e, "lore index rebuild failed, keeping previous index"),
        }
        outcome
    }

    /// Return a usable index, rebuilding when none exists or the current one is stale.
    ///
    /// If another rebuild is in flight, the previously published index (possibly
    /// `None`) is returned instead of waiting.
    pub async fn ensure_fresh(
        &self,
        now: DateTime<Utc>,
        ttl_secs: u64,
    ) -> LoreResult<Option<Arc<Index>>> {
        if let Some(index) = self.snapshot() {
            if !is_stale(index.built_at, now, ttl_secs) {
                return Ok(Some(index));
            }
            tracing::debug!(age = index.age_seconds(now), ttl_secs, "lore index is stale");
        }

        match self.rebuild().await? {
            RebuildOutcome::Rebuilt(index) => Ok(Some(index)),
            RebuildOutcome::AlreadyRunning => Ok(self.snapshot()),
        }
    }

    async fn build_index(&self) -> LoreResult<Index> {
        let documents = self.source.fetch_all().await.map_err(LoreError::from)?;
        let fetched = documents.len();

        let mut seen = HashSet::new();
        let accepted: Vec<IndexedEntry> = documents
            .into_iter()
            .filter(|doc| has_extension(&doc.path, &self.settings.extension))
            .filter_map(|doc| self.parse_document(doc))
            .filter(|entry| {
                let fresh = seen.insert(entry.path.clone());
                if !fresh {
                    tracing::warn!(path = %entry.path, "duplicate document path, keeping first");
                }
                fresh
            })
            .collect();

        let counter = self.counter.as_ref();
        let entries: Vec<IndexedEntry> = stream::iter(accepted)
            .map(|entry| cost_entry(counter, entry))
            .buffered(self.settings.batch_size.max(1))
            .collect()
            .await;

        tracing::debug!(fetched, indexed = entries.len(), "documents processed");

        Ok(Index {
            entries,
            built_at: Utc::now(),
        })
    }

    /// Parse and filter one document. `None` means it is not a lore entry.
    /// The token estimate is filled in later by [`cost_entry`].
    fn parse_document(&self, doc: RawDocument) -> Option<IndexedEntry> {
        let (fm, body) = frontmatter::parse(&doc.content);
        let tags = tag_set(&fm);

        if let Some(reason) = self.rejection(&fm, &tags) {
            tracing::trace!(path = %doc.path, reason, "document skipped");
            return None;
        }

        let content = sanitize(body);
        let title = resolve_title_with(&content, &doc.path, &self.settings.extension);
        let constant = fm.bool(CONSTANT_FIELD).unwrap_or(false)
            || contains_tag(&tags, &self.settings.always_tag);
        let scan_depth_override = fm
            .int(SCAN_DEPTH_FIELD)
            .and_then(|n| usize::try_from(n).ok());

        Some(IndexedEntry {
            path: doc.path,
            title,
            keys: fm.list(KEYS_FIELD),
            content,
            priority: fm.int(PRIORITY_FIELD).unwrap_or(DEFAULT_PRIORITY),
            constant,
            token_estimate: 0,
            scan_depth_override,
            exclude_from_recursion: fm.bool(EXCLUDE_RECURSION_FIELD).unwrap_or(false),
        })
    }

    fn rejection(&self, fm: &Frontmatter, tags: &BTreeSet<String>) -> Option<&'static str> {
        if !self.settings.include_tag.trim().is_empty()
            && !contains_tag(tags, &self.settings.include_tag)
        {
            return Some("missing include tag");
        }
        if fm.bool(ENABLED_FIELD) == Some(false) {
            return Some("disabled");
        }
        if contains_tag(tags, &self.settings.never_tag) {
            return Some("exclude tag present");
        }
        None
    }
}

async fn cost_entry(counter: &dyn TokenCounter, mut entry: IndexedEntry) -> IndexedEntry {
    entry.token_estimate = match counter.count_tokens(&entry.content).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(path = %entry.path, error = %e, "token counter failed, using estimate");
            estimate_tokens(&entry.content)
        }
    };
    entry
}

/// Lower-cased tags with any leading `#` removed.
fn tag_set(fm: &Frontmatter) -> BTreeSet<String> {
    fm.list(TAGS_FIELD)
        .iter()
        .map(|t| t.trim().trim_start_matches('#').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn contains_tag(tags: &BTreeSet<String>, tag: &str) -> bool {
    let tag = tag.trim().trim_start_matches('#').to_lowercase();
    !tag.is_empty() && tags.contains(&tag)
}

fn has_extension(path: &str, extension: &str) -> bool {
    path.len() >= extension.len()
        && path.is_char_boundary(path.len() - extension.len())
        && path[path.len() - extension.len()..].eq_ignore_ascii_case(extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::StaticSource;
    use crate::tokens::HeuristicCounter;

    fn indexer(docs: Vec<RawDocument>) -> VaultIndexer {
        VaultIndexer::new(
            Arc::new(StaticSource::new(docs)),
            Arc::new(HeuristicCounter),
            IndexSettings::default(),
        )
    }

    fn parse(indexer: &VaultIndexer, path: &str, content: &str) -> Option<IndexedEntry> {
        indexer.parse_document(RawDocument::new(path, content))
    }

    #[test]
    fn builds_entry_from_frontmatter() {
        let ix = indexer(vec![]);
        let doc = "---\ntags:\n  - Lorebook\nkeys:\n  - Eris\n  - discord\npriority: 5\nscanDepth: 2\nexcludeRecursion: true\n---\n# Eris\nGoddess of [[Discord|strife]].";
        let entry = parse(&ix, "People/eris.md", doc).unwrap();
        assert_eq!(entry.title, "Eris");
        assert_eq!(entry.keys, vec!["Eris", "discord"]);
        assert_eq!(entry.priority, 5);
        assert_eq!(entry.scan_depth_override, Some(2));
        assert!(entry.exclude_from_recursion);
        assert!(!entry.constant);
        assert_eq!(entry.content, "# Eris\nGoddess of strife.");
    }

    #[test]
    fn defaults_when_fields_absent_or_mistyped() {
        let ix = indexer(vec![]);
        let doc = "---\ntags: lorebook\npriority: high\n---\nBody";
        let entry = parse(&ix, "Places/Thera.md", doc).unwrap();
        assert_eq!(entry.title, "Thera");
        assert!(entry.keys.is_empty());
        assert_eq!(entry.priority, DEFAULT_PRIORITY);
        assert_eq!(entry.scan_depth_override, None);
        assert!(!entry.exclude_from_recursion);
    }

    #[test]
    fn rejects_by_tags_and_enabled_flag() {
        let ix = indexer(vec![]);
        assert!(parse(&ix, "a.md", "no frontmatter").is_none());
        assert!(parse(&ix, "a.md", "---\ntags:\n  - other\n---\n").is_none());
        assert!(parse(&ix, "a.md", "---\ntags:\n  - lorebook\nenabled: false\n---\n").is_none());
        assert!(parse(
            &ix,
            "a.md",
            "---\ntags:\n  - lorebook\n  - '#lorebook-never'\n---\n"
        )
        .is_none());
        assert!(parse(&ix, "a.md", "---\ntags:\n  - '#lorebook'\nenabled: true\n---\n").is_some());
    }

    #[test]
    fn constant_from_flag_or_always_tag() {
        let ix = indexer(vec![]);
        let by_flag = parse(&ix, "a.md", "---\ntags:\n- lorebook\nconstant: true\n---\n").unwrap();
        assert!(by_flag.constant);

        let inline = parse(&ix, "c.md", "---\ntags: [lorebook, lorebook-always]\n---\n").unwrap();
        assert!(inline.constant);

        let by_tag =
            parse(&ix, "b.md", "---\ntags:\n- lorebook\n- LOREBOOK-ALWAYS\n---\n").unwrap();
        assert!(by_tag.constant);
    }

    #[test]
    fn inline_quoted_tags_and_keys_are_unquoted() {
        let ix = indexer(vec![]);
        let doc = "---\ntags: [\"lorebook\"]\nkeys: [\"Eris\", 'discord']\n---\nBody";
        let entry = parse(&ix, "eris.md", doc).unwrap();
        assert_eq!(entry.keys, vec!["Eris", "discord"]);

        let never = "---\ntags: [\"lorebook\", \"#lorebook-never\"]\n---\nBody";
        assert!(parse(&ix, "b.md", never).is_none());
    }

    #[test]
    fn empty_include_tag_accepts_untagged_notes() {
        let ix = VaultIndexer::new(
            Arc::new(StaticSource::default()),
            Arc::new(HeuristicCounter),
            IndexSettings {
                include_tag: String::new(),
                ..IndexSettings::default()
            },
        );
        assert!(parse(&ix, "a.md", "plain note").is_some());
    }

    #[test]
    fn staleness_rules() {
        let built = Utc::now();
        assert!(!is_stale(built, built + Duration::seconds(10), 10));
        assert!(is_stale(built, built + Duration::seconds(11), 10));
        assert!(!is_stale(built, built + Duration::days(365), 0));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(has_extension("a/B.MD", ".md"));
        assert!(!has_extension("a/b.png", ".md"));
        assert!(!has_extension("md", ".md"));
    }

    #[tokio::test]
    async fn rebuild_filters_extension_and_duplicates() {
        let lore = "---\ntags:\n  - lorebook\n---\nbody";
        let ix = indexer(vec![
            RawDocument::new("a.md", lore),
            RawDocument::new("a.md", "---\ntags:\n  - lorebook\n---\nsecond"),
            RawDocument::new("b.txt", lore),
            RawDocument::new("c.MD", lore),
        ]);
        let RebuildOutcome::Rebuilt(index) = ix.rebuild().await.unwrap() else {
            panic!("expected a rebuild");
        };
        let paths: Vec<&str> = index.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "c.MD"]);
        assert_eq!(index.entries[0].content, "body");
        assert_eq!(index.entries[0].token_estimate, estimate_tokens("body"));
    }

    #[tokio::test]
    async fn store_skips_concurrent_rebuild() {
        let store = IndexStore::new();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let slow = store.rebuild(|| async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok::<_, LoreError>(Index {
                entries: vec![],
                built_at: Utc::now(),
            })
        });

        let second = async {
            let _ = started_rx.await;
            assert!(store.is_rebuilding());
            let outcome = store
                .rebuild(|| async {
                    Err::<Index, _>(LoreError::SourceUnavailable(SourceError::Misconfigured(
                        "second build must not run".into(),
                    )))
                })
                .await
                .unwrap();
            let _ = release_tx.send(());
            outcome
        };

        let (first, second) = tokio::join!(slow, second);
        assert!(matches!(first.unwrap(), RebuildOutcome::Rebuilt(_)));
        assert!(matches!(second, RebuildOutcome::AlreadyRunning));
        assert!(!store.is_rebuilding());
        assert!(store.snapshot().is_some());
    }
}
