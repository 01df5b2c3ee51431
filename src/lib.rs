//! Keyword-triggered lore retrieval from a note vault, served over MCP.
//!
//! LoreVault indexes tagged notes from an Obsidian vault (or a local
//! directory) into lorebook entries. Each request scans the most recent
//! dialogue turns for entry keys, follows keys mentioned inside matched
//! entries for a bounded number of steps, and renders the winners in
//! priority order under an entry and token budget.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`engine`]: The retrieval entry point ([`engine::LoreEngine`])
//! - [`lore`]: Frontmatter, sanitizing, indexing, matching, expansion, budgeting
//! - [`source`]: Where vault documents come from
//! - [`tokens`]: Token cost estimation
//! - [`server`] / [`tools`]: MCP server and its tool handlers

pub mod config;
pub mod engine;
pub mod error;
pub mod lore;
pub mod server;
pub mod source;
pub mod tokens;
pub mod tools;
