//! Token cost estimation for lore entries.
//!
//! Provides the [`TokenCounter`] trait, the length-based [`HeuristicCounter`],
//! and a HuggingFace tokenizer implementation in [`tokenizer`]. The counter is
//! created via [`create_counter`] from configuration.

pub mod tokenizer;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Characters per token assumed by the fallback estimate.
pub const CHARS_PER_TOKEN: f64 = 3.5;

/// Counts how many prompt tokens a piece of text costs.
///
/// Counting may suspend (a remote service or a blocking tokenizer), so the
/// trait is async. Callers fall back to [`estimate_tokens`] when it fails.
#[async_trait]
pub trait TokenCounter: Send + Sync {
    async fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Deterministic fallback: `ceil(chars / 3.5)`.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f64 / CHARS_PER_TOKEN).ceil() as usize
}

/// Counter that only uses [`estimate_tokens`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

#[async_trait]
impl TokenCounter for HeuristicCounter {
    async fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(estimate_tokens(text))
    }
}

/// Create a token counter from config.
///
/// `"heuristic"` needs nothing; `"tokenizer"` needs `tokenizer.json` in the
/// cache directory (see `lorevault tokenizer download`).
pub fn create_counter(config: &crate::config::TokenConfig) -> Result<Arc<dyn TokenCounter>> {
    match config.counter.as_str() {
        "heuristic" => Ok(Arc::new(HeuristicCounter)),
        "tokenizer" => Ok(Arc::new(tokenizer::TokenizerCounter::new(config)?)),
        other => anyhow::bail!("unknown token counter: {other}. Supported: heuristic, tokenizer"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcdefg"), 2);
        assert_eq!(estimate_tokens("abcdefgh"), 3);
    }

    #[test]
    fn estimate_counts_chars_not_bytes() {
        assert_eq!(estimate_tokens("ééééééé"), 2);
    }

    #[tokio::test]
    async fn heuristic_counter_matches_estimate() {
        let text = "The goddess of discord arrives.";
        assert_eq!(
            HeuristicCounter.count_tokens(text).await.unwrap(),
            estimate_tokens(text)
        );
    }
}
