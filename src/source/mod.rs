//! Document sources: where raw vault notes come from.
//!
//! Provides the [`DocumentSource`] trait and three implementations: the
//! Obsidian Local REST API ([`obsidian::ObsidianSource`]), a local directory
//! ([`filesystem::FilesystemSource`]), and a fixed in-memory set
//! ([`StaticSource`]). The source is created via [`create_source`] from
//! configuration.

pub mod filesystem;
pub mod obsidian;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::lore::types::RawDocument;

/// Supplies every document of the vault in one logical call.
///
/// Implementations handle pagination and folder recursion themselves. A
/// failure here aborts the index rebuild that requested it.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError>;
}

/// A fixed set of documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: Vec<RawDocument>,
}

impl StaticSource {
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError> {
        Ok(self.documents.clone())
    }
}

/// Create a document source from config.
///
/// Supported kinds: `"obsidian"` (Local REST API) and `"filesystem"`.
pub fn create_source(config: &SourceConfig) -> Result<Arc<dyn DocumentSource>> {
    match config.kind.as_str() {
        "obsidian" => Ok(Arc::new(obsidian::ObsidianSource::new(config)?)),
        "filesystem" => Ok(Arc::new(filesystem::FilesystemSource::new(
            crate::config::expand_tilde(&config.root),
        ))),
        other => anyhow::bail!("unknown source kind: {other}. Supported: obsidian, filesystem"),
    }
}
