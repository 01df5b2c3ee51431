//! Local directory document source.

use std::path::PathBuf;

use async_trait::async_trait;
use walkdir::WalkDir;

use super::DocumentSource;
use crate::error::SourceError;
use crate::lore::types::RawDocument;

/// Reads every file under `root`. Paths are reported relative to `root`
/// with `/` separators, matching what the REST source returns.
pub struct FilesystemSource {
    root: PathBuf,
}

impl FilesystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_all(root: PathBuf) -> Result<Vec<RawDocument>, SourceError> {
        if !root.is_dir() {
            return Err(SourceError::Misconfigured(format!(
                "vault root {} is not a directory",
                root.display()
            )));
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| SourceError::Io {
                path: e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string()),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            match std::fs::read_to_string(entry.path()) {
                Ok(content) => documents.push(RawDocument::new(relative, content)),
                // Binary attachments live next to notes in most vaults.
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    tracing::debug!(path = %relative, "skipping non-UTF-8 file");
                }
                Err(e) => {
                    return Err(SourceError::Io {
                        path: entry.path().display().to_string(),
                        source: e,
                    })
                }
            }
        }
        Ok(documents)
    }
}

#[async_trait]
impl DocumentSource for FilesystemSource {
    async fn fetch_all(&self) -> Result<Vec<RawDocument>, SourceError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Self::read_all(root))
            .await
            .map_err(|e| SourceError::Misconfigured(format!("filesystem scan task failed: {e}")))?
    }
}
