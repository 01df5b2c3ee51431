//! MCP server initialization for stdio and SSE transports.
//!
//! Provides [`serve_stdio`] and [`serve_sse`] entry points that wire up the
//! document source, token counter, and lore engine into a running server.

use crate::config::LoreVaultConfig;
use crate::engine::LoreEngine;
use crate::tools::LoreTools;
use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;

/// Shared setup: build the engine and warm the index in the background.
fn setup_engine(config: &LoreVaultConfig) -> Result<Arc<LoreEngine>> {
    let engine = Arc::new(LoreEngine::from_config(config)?);

    if config.lorebook.enabled {
        let warm = Arc::clone(&engine);
        tokio::spawn(async move {
            // Failure is logged by the indexer; the first request retries.
            let _ = warm.force_refresh().await;
        });
    } else {
        tracing::info!("lorebook disabled in config, retrieval will return nothing");
    }

    Ok(engine)
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: LoreVaultConfig) -> Result<()> {
    tracing::info!("starting LoreVault MCP server on stdio");

    let engine = setup_engine(&config)?;

    let tools = LoreTools::new(engine);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP (SSE) transport.
pub async fn serve_sse(config: LoreVaultConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting LoreVault MCP server on SSE/HTTP");

    let engine = setup_engine(&config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(LoreTools::new(Arc::clone(&engine))),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down SSE server");
        })
        .await?;

    Ok(())
}
