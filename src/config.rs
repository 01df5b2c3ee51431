use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::lore::budget::BudgetLimits;
use crate::lore::expand::ScanSettings;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoreVaultConfig {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub tokens: TokenConfig,
    pub lorebook: LorebookConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// `"obsidian"` or `"filesystem"`.
    pub kind: String,
    pub base_url: String,
    pub api_key: String,
    /// Vault folder to index (REST source). Empty means the whole vault.
    pub folder: String,
    /// Local vault directory (filesystem source).
    pub root: String,
    /// Note extension, compared case-insensitively.
    pub extension: String,
    pub fetch_concurrency: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TokenConfig {
    /// `"heuristic"` or `"tokenizer"`.
    pub counter: String,
    pub cache_dir: String,
    /// Entries counted concurrently during a rebuild.
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LorebookConfig {
    pub enabled: bool,
    pub include_tag: String,
    pub always_tag: String,
    pub never_tag: String,
    pub scan_depth: usize,
    pub max_entries: usize,
    pub unlimited_entries: bool,
    pub max_tokens: usize,
    pub unlimited_budget: bool,
    pub case_sensitive: bool,
    pub match_whole_words: bool,
    pub recursive_scan: bool,
    pub max_recursion_steps: usize,
    /// Seconds before the index is rebuilt on the next request. 0 never expires.
    pub cache_ttl_secs: u64,
    pub template: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8765,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: "obsidian".into(),
            base_url: "http://127.0.0.1:27123".into(),
            api_key: String::new(),
            folder: String::new(),
            root: "~/vault".into(),
            extension: ".md".into(),
            fetch_concurrency: 8,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        let cache_dir = default_lorevault_dir()
            .join("tokenizer")
            .to_string_lossy()
            .into_owned();
        Self {
            counter: "heuristic".into(),
            cache_dir,
            batch_size: 16,
        }
    }
}

impl Default for LorebookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_tag: "lorebook".into(),
            always_tag: "lorebook-always".into(),
            never_tag: "lorebook-never".into(),
            scan_depth: 4,
            max_entries: 10,
            unlimited_entries: false,
            max_tokens: 2048,
            unlimited_budget: false,
            case_sensitive: false,
            match_whole_words: true,
            recursive_scan: true,
            max_recursion_steps: 3,
            cache_ttl_secs: 300,
            template: "[{{title}}]\n{{content}}".into(),
        }
    }
}

/// Valid ranges for numeric lorebook settings. Values outside are clamped.
pub const SCAN_DEPTH_RANGE: (usize, usize) = (1, 1000);
pub const MAX_ENTRIES_RANGE: (usize, usize) = (1, 1000);
pub const MAX_TOKENS_RANGE: (usize, usize) = (1, 1_000_000);
pub const RECURSION_STEPS_RANGE: (usize, usize) = (0, 10);

impl LorebookConfig {
    /// Copy of these settings with every numeric field clamped into range.
    pub fn clamped(&self) -> Self {
        let mut out = self.clone();
        out.scan_depth = clamp_logged("scan_depth", self.scan_depth, SCAN_DEPTH_RANGE);
        out.max_entries = clamp_logged("max_entries", self.max_entries, MAX_ENTRIES_RANGE);
        out.max_tokens = clamp_logged("max_tokens", self.max_tokens, MAX_TOKENS_RANGE);
        out.max_recursion_steps = clamp_logged(
            "max_recursion_steps",
            self.max_recursion_steps,
            RECURSION_STEPS_RANGE,
        );
        out
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            scan_depth: self.scan_depth,
            case_sensitive: self.case_sensitive,
            whole_words: self.match_whole_words,
            recursive: self.recursive_scan,
            max_recursion_steps: self.max_recursion_steps,
        }
    }

    pub fn budget_limits(&self) -> BudgetLimits {
        BudgetLimits {
            max_entries: (!self.unlimited_entries).then_some(self.max_entries),
            max_tokens: (!self.unlimited_budget).then_some(self.max_tokens),
        }
    }
}

fn clamp_logged(name: &str, value: usize, (min, max): (usize, usize)) -> usize {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::debug!(setting = name, value, clamped, "setting out of range, clamped");
    }
    clamped
}

/// Returns `~/.lorevault/`
pub fn default_lorevault_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".lorevault")
}

/// Returns the default config file path: `~/.lorevault/config.toml`
pub fn default_config_path() -> PathBuf {
    default_lorevault_dir().join("config.toml")
}

impl LoreVaultConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LoreVaultConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (LOREVAULT_LOG_LEVEL, LOREVAULT_API_KEY,
    /// LOREVAULT_BASE_URL, LOREVAULT_ROOT).
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("LOREVAULT_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Some(val) = lookup("LOREVAULT_API_KEY") {
            self.source.api_key = val;
        }
        if let Some(val) = lookup("LOREVAULT_BASE_URL") {
            self.source.base_url = val;
        }
        if let Some(val) = lookup("LOREVAULT_ROOT") {
            self.source.root = val;
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LoreVaultConfig::default();
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.source.kind, "obsidian");
        assert_eq!(config.source.extension, ".md");
        assert_eq!(config.tokens.counter, "heuristic");
        assert_eq!(config.lorebook.include_tag, "lorebook");
        assert_eq!(config.lorebook.cache_ttl_secs, 300);
        assert!(config.lorebook.template.contains("{{title}}"));
        assert!(config.lorebook.template.contains("{{content}}"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r###"
[server]
log_level = "debug"

[source]
kind = "filesystem"
root = "/srv/vault"

[lorebook]
include_tag = "lore"
max_entries = 3
unlimited_budget = true
template = "## {{title}}\n{{content}}"
"###;
        let config: LoreVaultConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.source.kind, "filesystem");
        assert_eq!(config.source.root, "/srv/vault");
        assert_eq!(config.lorebook.include_tag, "lore");
        assert_eq!(config.lorebook.max_entries, 3);
        assert!(config.lorebook.unlimited_budget);
        assert_eq!(config.lorebook.template, "## {{title}}\n{{content}}");
        // defaults still apply for unset fields
        assert_eq!(config.lorebook.scan_depth, 4);
        assert_eq!(config.source.fetch_concurrency, 8);
    }

    #[test]
    fn clamps_out_of_range_settings() {
        let config = LorebookConfig {
            scan_depth: 0,
            max_entries: 5000,
            max_tokens: 0,
            max_recursion_steps: 99,
            ..LorebookConfig::default()
        };
        let clamped = config.clamped();
        assert_eq!(clamped.scan_depth, 1);
        assert_eq!(clamped.max_entries, 1000);
        assert_eq!(clamped.max_tokens, 1);
        assert_eq!(clamped.max_recursion_steps, 10);

        let untouched = LorebookConfig::default().clamped();
        assert_eq!(untouched.scan_depth, 4);
        assert_eq!(untouched.max_recursion_steps, 3);
    }

    #[test]
    fn budget_limits_follow_unlimited_flags() {
        let config = LorebookConfig {
            unlimited_entries: true,
            max_tokens: 512,
            ..LorebookConfig::default()
        };
        let limits = config.budget_limits();
        assert_eq!(limits.max_entries, None);
        assert_eq!(limits.max_tokens, Some(512));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = LoreVaultConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.lorebook.max_entries, 10);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = LoreVaultConfig::default();
        let env: std::collections::HashMap<&str, &str> = [
            ("LOREVAULT_API_KEY", "env-key"),
            ("LOREVAULT_BASE_URL", "http://vault.local:1234"),
            ("LOREVAULT_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.source.api_key, "env-key");
        assert_eq!(config.source.base_url, "http://vault.local:1234");
        assert_eq!(config.server.log_level, "trace");
        // unset variables leave defaults alone
        assert_eq!(config.source.root, "~/vault");
    }
}
