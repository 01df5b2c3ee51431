#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lorevault::config::{LoreVaultConfig, LorebookConfig};
use lorevault::engine::LoreEngine;
use lorevault::error::SourceError;
use lorevault::lore::types::{DialogueTurn, RawDocument};
use lorevault::source::DocumentSource;
use lorevault::tokens::HeuristicCounter;
use tokio::sync::Notify;

/// Build a lore note: `#lorebook` tag, the given keys, and any extra
/// frontmatter lines, followed by `body`.
pub fn lore_doc(keys: &[&str], extra: &[&str], body: &str) -> String {
    let mut out = String::from("---\ntags:\n  - lorebook\n");
    if !keys.is_empty() {
        out.push_str("keys:\n");
        for key in keys {
            out.push_str(&format!("  - {key}\n"));
        }
    }
    for line in extra {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("---\n");
    out.push_str(body);
    out
}

pub fn doc(path: &str, content: String) -> RawDocument {
    RawDocument::new(path, content)
}

pub fn turn(text: &str) -> DialogueTurn {
    DialogueTurn::new("user", text)
}

/// A source whose documents can be swapped and which can be made to fail.
/// Counts every fetch.
#[derive(Default)]
pub struct ScriptedSource {
    documents: Mutex<Vec<RawDocument>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(documents: Vec<RawDocument>) -> Arc<Self> {
        Arc::new(Self {
            documents: Mutex::new(documents),
            ..Self::default()
        })
    }

    pub fn set_documents(&self, documents: Vec<RawDocument>) {
        *self.documents.lock().unwrap() = documents;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for ScriptedSource {
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Misconfigured("vault offline".into()));
        }
        Ok(self.documents.lock().unwrap().clone())
    }
}

/// A source that blocks inside `fetch_all` until released.
#[derive(Default)]
pub struct GatedSource {
    pub started: Notify,
    pub release: Notify,
    documents: Vec<RawDocument>,
}

impl GatedSource {
    pub fn new(documents: Vec<RawDocument>) -> Arc<Self> {
        Arc::new(Self {
            documents,
            ..Self::default()
        })
    }
}

#[async_trait]
impl DocumentSource for GatedSource {
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.documents.clone())
    }
}

/// Engine over `source` with the heuristic counter and the given lorebook settings.
pub fn engine_with(source: Arc<dyn DocumentSource>, lorebook: LorebookConfig) -> LoreEngine {
    let config = LoreVaultConfig {
        lorebook,
        ..LoreVaultConfig::default()
    };
    LoreEngine::with_collaborators(source, Arc::new(HeuristicCounter), &config)
}

pub fn engine(source: Arc<dyn DocumentSource>) -> LoreEngine {
    engine_with(source, LorebookConfig::default())
}
