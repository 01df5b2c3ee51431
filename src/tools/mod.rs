pub mod lore_refresh;
pub mod lore_retrieve;
pub mod lore_status;

use lore_refresh::LoreRefreshParams;
use lore_retrieve::LoreRetrieveParams;
use lore_status::LoreStatusParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::sync::Arc;

use crate::engine::LoreEngine;
use crate::lore::index::RebuildOutcome;

/// The LoreVault MCP tool handler. Holds the shared engine and exposes the
/// retrieval tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct LoreTools {
    tool_router: ToolRouter<Self>,
    engine: Arc<LoreEngine>,
}

#[tool_router]
impl LoreTools {
    pub fn new(engine: Arc<LoreEngine>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
        }
    }

    /// Select lore for a dialogue window.
    #[tool(description = "Find lorebook entries whose keywords appear in the recent dialogue. Returns the rendered injection text plus why each entry matched.")]
    async fn lore_retrieve(
        &self,
        Parameters(params): Parameters<LoreRetrieveParams>,
    ) -> Result<String, String> {
        let window = params.window();
        let settings = params.settings(self.engine.settings());

        tracing::info!(
            turns = window.len(),
            scan_depth = settings.scan_depth,
            "lore_retrieve called"
        );

        let retrieval = self
            .engine
            .retrieve_with(&window, &settings)
            .await
            .map_err(|e| format!("retrieval failed: {e}"))?;

        tracing::info!(
            selected = retrieval.selected_count,
            tokens = retrieval.total_tokens,
            "lore retrieved"
        );

        serde_json::to_string(&retrieval).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Report on the published index.
    #[tool(description = "Get lore index status: entry counts, total tokens, cache age, and whether a rebuild is running.")]
    async fn lore_status(
        &self,
        Parameters(_params): Parameters<LoreStatusParams>,
    ) -> Result<String, String> {
        tracing::info!("lore_status called");
        serde_json::to_string(&self.engine.status())
            .map_err(|e| format!("serialization failed: {e}"))
    }

    /// Rebuild the index immediately.
    #[tool(description = "Rebuild the lore index from the vault now, ignoring the cache TTL.")]
    async fn lore_refresh(
        &self,
        Parameters(_params): Parameters<LoreRefreshParams>,
    ) -> Result<String, String> {
        tracing::info!("lore_refresh called");
        let outcome = self
            .engine
            .force_refresh()
            .await
            .map_err(|e| format!("refresh failed: {e}"))?;

        let body = match outcome {
            RebuildOutcome::Rebuilt(index) => serde_json::json!({
                "status": "rebuilt",
                "entry_count": index.entries.len(),
                "constant_count": index.constant_count(),
                "total_tokens": index.total_tokens(),
                "built_at": index.built_at,
            }),
            RebuildOutcome::AlreadyRunning => serde_json::json!({
                "status": "already_running",
                "message": "a rebuild is already in progress; the current index stays in use"
            }),
        };
        Ok(body.to_string())
    }
}

#[tool_handler]
impl ServerHandler for LoreTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "LoreVault injects worldbuilding notes into conversations. Call lore_retrieve \
                 with the recent dialogue before generating a reply, lore_status to inspect \
                 the index, and lore_refresh after editing the vault."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
