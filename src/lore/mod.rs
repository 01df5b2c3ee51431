//! Lorebook core: parsing vault notes into entries and selecting them for a
//! dialogue window.
//!
//! - [`frontmatter`] reads the `---` metadata block at the top of a note
//! - [`sanitize`] strips vault markup and resolves entry titles
//! - [`index`] builds, caches, and rebuilds the entry index
//! - [`matcher`] tests entry keys against scan text
//! - [`expand`] finds initial matches and expands them recursively
//! - [`budget`] renders matched entries under entry and token limits

pub mod budget;
pub mod expand;
pub mod frontmatter;
pub mod index;
pub mod matcher;
pub mod sanitize;
pub mod types;
