mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lorevault::{config, server};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lorevault", version, about = "Keyword-triggered lore retrieval MCP server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server
    Serve {
        /// Transport: "stdio" or "sse". Defaults to the config value.
        #[arg(long)]
        transport: Option<String>,
    },
    /// Retrieve lore for a dialogue window given as "speaker: text" turns
    Retrieve {
        /// Dialogue turns, oldest first
        #[arg(required = true)]
        turns: Vec<String>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build the index and show its status
    Status,
    /// Rebuild the index and list indexed entries
    Refresh,
    /// Manage the tokenizer used for token counting
    Tokenizer {
        #[command(subcommand)]
        action: TokenizerAction,
    },
}

#[derive(Subcommand)]
enum TokenizerAction {
    /// Download the tokenizer to ~/.lorevault/tokenizer/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::LoreVaultConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            let transport = transport.unwrap_or_else(|| config.server.transport.clone());
            match transport.as_str() {
                "stdio" => server::serve_stdio(config).await?,
                "sse" | "http" => server::serve_sse(config).await?,
                other => anyhow::bail!("unknown transport: {other}. Supported: stdio, sse"),
            }
        }
        Command::Retrieve { turns, json } => {
            cli::retrieve::retrieve(&config, &turns, json).await?;
        }
        Command::Status => {
            cli::status::status(&config).await?;
        }
        Command::Refresh => {
            cli::refresh::refresh(&config).await?;
        }
        Command::Tokenizer { action } => match action {
            TokenizerAction::Download => {
                cli::tokenizer_download(&config.tokens).await?;
            }
        },
    }

    Ok(())
}
