use anyhow::Result;

use lorevault::config::LoreVaultConfig;
use lorevault::engine::LoreEngine;
use lorevault::lore::types::DialogueTurn;

/// Run one retrieval from the terminal. Each turn is `"speaker: text"`.
pub async fn retrieve(config: &LoreVaultConfig, turns: &[String], json: bool) -> Result<()> {
    let window = turns
        .iter()
        .map(|t| t.parse::<DialogueTurn>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!(e))?;

    let engine = LoreEngine::from_config(config)?;
    let retrieval = engine.retrieve(&window).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&retrieval)?);
        return Ok(());
    }

    if retrieval.match_reasons.is_empty() {
        println!("No lore matched.");
        return Ok(());
    }

    println!(
        "Matched {} entr{} ({} injected, ~{} tokens)\n",
        retrieval.match_reasons.len(),
        if retrieval.match_reasons.len() == 1 { "y" } else { "ies" },
        retrieval.selected_count,
        retrieval.total_tokens
    );

    for (i, m) in retrieval.match_reasons.iter().enumerate() {
        let marker = if m.injected { "+" } else { "-" };
        println!(
            "  {}. {marker} {} [{}] (priority {}): {}",
            i + 1,
            m.title,
            m.path,
            m.priority,
            m.reason
        );
    }

    if !retrieval.injection_text.is_empty() {
        println!("\n{}", "=".repeat(40));
        println!("{}", retrieval.injection_text);
    }

    Ok(())
}
