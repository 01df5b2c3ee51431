//! The retrieval engine: index freshness, matching, and rendering in one call.
//!
//! [`LoreEngine`] owns the [`VaultIndexer`] and the lorebook settings. Hosts
//! either call [`LoreEngine::retrieve`] directly or take the function value
//! returned by [`LoreEngine::injector`], which never fails and degrades any
//! error to an empty injection.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;

use crate::config::{LoreVaultConfig, LorebookConfig};
use crate::error::LoreResult;
use crate::lore::budget;
use crate::lore::expand::find_matches;
use crate::lore::index::{IndexSettings, RebuildOutcome, VaultIndexer};
use crate::lore::types::{DialogueTurn, Index};
use crate::source::{self, DocumentSource};
use crate::tokens::{self, TokenCounter};

/// Why one entry was selected, and whether it survived budgeting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MatchReason {
    pub path: String,
    pub title: String,
    pub reason: String,
    pub priority: i64,
    pub injected: bool,
}

/// Result of one retrieval request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Retrieval {
    pub injection_text: String,
    pub selected_count: usize,
    pub total_tokens: usize,
    /// Every matched entry in priority order, including ones cut by the budget.
    pub match_reasons: Vec<MatchReason>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.selected_count == 0
    }
}

/// Diagnostic view of the published index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStatus {
    pub entry_count: usize,
    pub constant_count: usize,
    pub total_tokens: usize,
    /// `None` until the first index is published.
    pub cache_age_seconds: Option<i64>,
    pub built_at: Option<DateTime<Utc>>,
    pub rebuilding: bool,
}

/// Host-facing retrieval function handed out at wiring time.
pub type Injector = Arc<dyn Fn(Vec<DialogueTurn>) -> BoxFuture<'static, Retrieval> + Send + Sync>;

pub struct LoreEngine {
    indexer: VaultIndexer,
    settings: LorebookConfig,
}

impl LoreEngine {
    pub fn new(indexer: VaultIndexer, settings: LorebookConfig) -> Self {
        Self {
            indexer,
            settings: settings.clamped(),
        }
    }

    /// Wire an engine from explicit collaborators.
    pub fn with_collaborators(
        source: Arc<dyn DocumentSource>,
        counter: Arc<dyn TokenCounter>,
        config: &LoreVaultConfig,
    ) -> Self {
        let settings = IndexSettings::from_config(&config.lorebook, &config.source, &config.tokens);
        Self::new(
            VaultIndexer::new(source, counter, settings),
            config.lorebook.clone(),
        )
    }

    /// Build the configured document source and token counter, then wire an engine.
    pub fn from_config(config: &LoreVaultConfig) -> Result<Self> {
        let source = source::create_source(&config.source)?;
        let counter = tokens::create_counter(&config.tokens)?;
        tracing::info!(
            source = %config.source.kind,
            counter = %config.tokens.counter,
            "lore engine ready"
        );
        Ok(Self::with_collaborators(source, counter, config))
    }

    pub fn settings(&self) -> &LorebookConfig {
        &self.settings
    }

    /// Retrieve with the engine's own settings.
    pub async fn retrieve(&self, window: &[DialogueTurn]) -> LoreResult<Retrieval> {
        self.retrieve_with(window, &self.settings).await
    }

    /// Retrieve with per-request settings. Index-shaping settings (tags,
    /// extension) stay those the engine was built with.
    ///
    /// Fails only when the source is unreachable and no index has ever been
    /// published; a stale index is used rather than failing.
    pub async fn retrieve_with(
        &self,
        window: &[DialogueTurn],
        settings: &LorebookConfig,
    ) -> LoreResult<Retrieval> {
        self.retrieve_at(window, settings, Utc::now()).await
    }

    /// [`retrieve_with`](Self::retrieve_with) with index staleness judged at `now`.
    pub async fn retrieve_at(
        &self,
        window: &[DialogueTurn],
        settings: &LorebookConfig,
        now: DateTime<Utc>,
    ) -> LoreResult<Retrieval> {
        let settings = settings.clamped();
        if !settings.enabled {
            return Ok(Retrieval::default());
        }
        if window.iter().all(|turn| turn.text.trim().is_empty()) {
            tracing::debug!("empty scan window, nothing to retrieve");
            return Ok(Retrieval::default());
        }

        let index = match self
            .indexer
            .ensure_fresh(now, settings.cache_ttl_secs)
            .await
        {
            Ok(Some(index)) => index,
            Ok(None) => {
                tracing::debug!("first index still building, nothing to retrieve yet");
                return Ok(Retrieval::default());
            }
            Err(e) => match self.indexer.snapshot() {
                Some(stale) => {
                    tracing::warn!(error = %e, "refresh failed, matching against previous index");
                    stale
                }
                None => return Err(e),
            },
        };

        Ok(select(&index, window, &settings))
    }

    /// Rebuild now, regardless of TTL.
    pub async fn force_refresh(&self) -> LoreResult<RebuildOutcome> {
        self.indexer.rebuild().await
    }

    pub fn status(&self) -> IndexStatus {
        let rebuilding = self.indexer.is_rebuilding();
        match self.indexer.snapshot() {
            Some(index) => IndexStatus {
                entry_count: index.entries.len(),
                constant_count: index.constant_count(),
                total_tokens: index.total_tokens(),
                cache_age_seconds: Some(index.age_seconds(Utc::now())),
                built_at: Some(index.built_at),
                rebuilding,
            },
            None => IndexStatus {
                rebuilding,
                ..IndexStatus::default()
            },
        }
    }

    /// A retrieval function for the host. Errors become an empty injection.
    pub fn injector(self: &Arc<Self>) -> Injector {
        let engine = Arc::clone(self);
        Arc::new(move |window: Vec<DialogueTurn>| {
            let engine = Arc::clone(&engine);
            async move {
                match engine.retrieve(&window).await {
                    Ok(retrieval) => retrieval,
                    Err(e) => {
                        tracing::warn!(error = %e, "lore retrieval unavailable, injecting nothing");
                        Retrieval::default()
                    }
                }
            }
            .boxed()
        })
    }
}

/// Match, expand, and render against one index snapshot. Synchronous.
fn select(index: &Index, window: &[DialogueTurn], settings: &LorebookConfig) -> Retrieval {
    let matches = find_matches(&index.entries, &settings.scan_settings(), window);
    let formatted = budget::format(&matches.entries, &settings.template, &settings.budget_limits());

    let match_reasons = matches
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| MatchReason {
            path: entry.path.clone(),
            title: entry.title.clone(),
            reason: matches.reason_for(entry).unwrap_or_default().to_string(),
            priority: entry.priority,
            injected: i < formatted.count,
        })
        .collect();

    tracing::debug!(
        matched = matches.entries.len(),
        injected = formatted.count,
        tokens = formatted.total_tokens,
        "lore selected"
    );

    Retrieval {
        injection_text: formatted.text,
        selected_count: formatted.count,
        total_tokens: formatted.total_tokens,
        match_reasons,
    }
}
