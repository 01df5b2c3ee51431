use anyhow::Result;

use lorevault::config::LoreVaultConfig;
use lorevault::engine::LoreEngine;

/// Build the index once and display its status in the terminal.
pub async fn status(config: &LoreVaultConfig) -> Result<()> {
    let engine = LoreEngine::from_config(config)?;
    engine.force_refresh().await?;
    let status = engine.status();

    println!("Lore Index Status");
    println!("{}", "=".repeat(40));
    println!("  Source:              {}", config.source.kind);
    println!("  Include tag:         #{}", config.lorebook.include_tag);
    println!("  Enabled:             {}", config.lorebook.enabled);
    println!();
    println!("  Entries:             {}", status.entry_count);
    println!("  Constant entries:    {}", status.constant_count);
    println!("  Total tokens:        {}", status.total_tokens);

    if let Some(built_at) = status.built_at {
        println!("  Built at:            {}", built_at.to_rfc3339());
    }
    println!("  Cache TTL:           {}s", config.lorebook.cache_ttl_secs);

    Ok(())
}
