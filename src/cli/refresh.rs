use anyhow::Result;

use lorevault::config::LoreVaultConfig;
use lorevault::engine::LoreEngine;
use lorevault::lore::index::RebuildOutcome;

/// Rebuild the index from the vault and report what was indexed.
pub async fn refresh(config: &LoreVaultConfig) -> Result<()> {
    let engine = LoreEngine::from_config(config)?;

    match engine.force_refresh().await? {
        RebuildOutcome::Rebuilt(index) => {
            println!(
                "Indexed {} entries ({} constant, ~{} tokens).",
                index.entries.len(),
                index.constant_count(),
                index.total_tokens()
            );
            for entry in &index.entries {
                let keys = if entry.keys.is_empty() {
                    "(no keys)".to_string()
                } else {
                    entry.keys.join(", ")
                };
                println!("  {:<40} {:>5}  {}", entry.path, entry.priority, keys);
            }
        }
        RebuildOutcome::AlreadyRunning => println!("A rebuild is already running."),
    }

    Ok(())
}
