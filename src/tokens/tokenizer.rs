//! HuggingFace tokenizer token counter.
//!
//! Implements [`TokenCounter`] by encoding text with a `tokenizer.json`
//! loaded from the cache directory. Encoding is CPU-bound, so it runs on the
//! blocking pool.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokenizers::Tokenizer;

use super::TokenCounter;
use crate::config::TokenConfig;

/// File name the counter loads from the cache directory.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerCounter {
    tokenizer: Arc<Tokenizer>,
}

impl TokenizerCounter {
    pub fn new(config: &TokenConfig) -> Result<Self> {
        let tokenizer_path = crate::config::expand_tilde(&config.cache_dir).join(TOKENIZER_FILE);

        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `lorevault tokenizer download` first.",
            tokenizer_path.display()
        );

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tracing::info!(tokenizer = %tokenizer_path.display(), "tokenizer loaded");

        Ok(Self {
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl TokenCounter for TokenizerCounter {
    async fn count_tokens(&self, text: &str) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }

        let tokenizer = Arc::clone(&self.tokenizer);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            tokenizer
                .encode(text, false)
                .map(|encoding| encoding.get_ids().len())
                .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))
        })
        .await?
    }
}
