//! MCP `lore_retrieve` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::LorebookConfig;
use crate::lore::types::DialogueTurn;

/// One dialogue turn as sent by the client.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TurnParam {
    /// Who spoke. Defaults to `"user"`.
    #[schemars(description = "Speaker name. Defaults to 'user'.")]
    pub speaker: Option<String>,

    #[schemars(description = "What was said")]
    pub text: String,
}

/// Parameters for the `lore_retrieve` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LoreRetrieveParams {
    /// Dialogue window, oldest turn first.
    #[schemars(description = "Recent dialogue turns, oldest first. The last scan_depth turns are scanned for keywords.")]
    pub messages: Vec<TurnParam>,

    #[schemars(description = "How many trailing turns to scan (1-1000). Defaults to the server setting.")]
    pub scan_depth: Option<usize>,

    #[schemars(description = "Maximum entries to inject (1-1000). Defaults to the server setting.")]
    pub max_entries: Option<usize>,

    #[schemars(description = "Token budget for injected lore (1-1000000). Defaults to the server setting.")]
    pub max_tokens: Option<usize>,

    /// If `false`, keys found inside matched entries are not followed.
    #[schemars(description = "Follow keys mentioned inside matched entries. Defaults to the server setting.")]
    pub recursive: Option<bool>,
}

impl LoreRetrieveParams {
    pub fn window(&self) -> Vec<DialogueTurn> {
        self.messages
            .iter()
            .map(|m| DialogueTurn::new(m.speaker.as_deref().unwrap_or("user"), m.text.as_str()))
            .collect()
    }

    /// Server settings with this request's overrides applied.
    pub fn settings(&self, base: &LorebookConfig) -> LorebookConfig {
        let mut settings = base.clone();
        if let Some(depth) = self.scan_depth {
            settings.scan_depth = depth;
        }
        if let Some(max) = self.max_entries {
            settings.max_entries = max;
        }
        if let Some(max) = self.max_tokens {
            settings.max_tokens = max;
        }
        if let Some(recursive) = self.recursive {
            settings.recursive_scan = recursive;
        }
        settings.clamped()
    }
}
