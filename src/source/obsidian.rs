//! Obsidian Local REST API document source.
//!
//! Walks a vault folder through `GET /vault/{folder}/`, which answers with
//! `{"files": [...]}` where folder names end in `/`, then downloads every note
//! with the configured extension. Downloads run with bounded concurrency.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::DocumentSource;
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::lore::types::RawDocument;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct FolderListing {
    files: Vec<String>,
}

pub struct ObsidianSource {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    folder: String,
    extension: String,
    concurrency: usize,
}

impl ObsidianSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("invalid Obsidian base URL: {}", config.base_url))?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "Obsidian base URL must be hierarchical: {}",
            config.base_url
        );

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        let api_key = Some(config.api_key.trim())
            .filter(|k| !k.is_empty())
            .map(String::from);
        if api_key.is_none() {
            tracing::warn!("no Obsidian API key configured; requests will be unauthenticated");
        }

        Ok(Self {
            client,
            base_url,
            api_key,
            folder: config.folder.trim_matches('/').to_string(),
            extension: config.extension.to_ascii_lowercase(),
            concurrency: config.fetch_concurrency.max(1),
        })
    }

    /// Build `{base}/vault/{path}`, percent-encoding each segment.
    fn vault_url(&self, path: &str, is_folder: bool) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                SourceError::Misconfigured(format!("cannot extend base URL {}", self.base_url))
            })?;
            segments.pop_if_empty().push("vault");
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            if is_folder {
                segments.push("");
            }
        }
        Ok(url)
    }

    async fn get(&self, url: &Url, accept: &str) -> Result<reqwest::Response, SourceError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, accept);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request.send().await.map_err(|source| SourceError::Transport {
            url: url.to_string(),
            source,
        })
    }

    async fn list_folder(&self, folder: &str) -> Result<Vec<String>, SourceError> {
        let url = self.vault_url(folder, true)?;
        let response = self.get(&url, "application/json").await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let body = response.text().await.map_err(|source| SourceError::Transport {
            url: url.to_string(),
            source,
        })?;
        let listing: FolderListing =
            serde_json::from_str(&body).map_err(|e| SourceError::MalformedPayload {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(listing.files)
    }

    /// Recursively collect note paths under the configured folder.
    async fn list_notes(&self) -> Result<Vec<String>, SourceError> {
        let mut pending = VecDeque::from([self.folder.clone()]);
        let mut notes = Vec::new();

        while let Some(folder) = pending.pop_front() {
            for name in self.list_folder(&folder).await? {
                let full = if folder.is_empty() {
                    name
                } else {
                    format!("{folder}/{name}")
                };
                if let Some(sub) = full.strip_suffix('/') {
                    pending.push_back(sub.to_string());
                } else if full.to_ascii_lowercase().ends_with(&self.extension) {
                    notes.push(full);
                }
            }
        }

        Ok(notes)
    }

    /// Download one note. A 404 means it vanished after listing and is skipped.
    async fn fetch_note(&self, path: String) -> Result<Option<RawDocument>, SourceError> {
        let url = self.vault_url(&path, false)?;
        let response = self.get(&url, "text/markdown").await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::warn!(path = %path, "note disappeared between listing and download");
                Ok(None)
            }
            status if status.is_success() => {
                let content = response.text().await.map_err(|source| SourceError::Transport {
                    url: url.to_string(),
                    source,
                })?;
                Ok(Some(RawDocument::new(path, content)))
            }
            status => Err(SourceError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }
}

#[async_trait]
impl DocumentSource for ObsidianSource {
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError> {
        let paths = self.list_notes().await?;
        tracing::debug!(notes = paths.len(), folder = %self.folder, "vault listing complete");

        let results: Vec<Result<Option<RawDocument>, SourceError>> = stream::iter(paths)
            .map(|path| self.fetch_note(path))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut documents = Vec::with_capacity(results.len());
        for result in results {
            if let Some(doc) = result? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }
}
