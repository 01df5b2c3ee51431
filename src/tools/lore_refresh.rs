//! MCP `lore_refresh` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `lore_refresh` MCP tool. Takes none.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct LoreRefreshParams {}
