//! Template rendering of selected entries under entry-count and token ceilings.

use super::types::IndexedEntry;

/// Placeholder replaced with the entry title.
pub const TITLE_PLACEHOLDER: &str = "{{title}}";
/// Placeholder replaced with the entry content.
pub const CONTENT_PLACEHOLDER: &str = "{{content}}";

/// Separator between rendered entries.
const ENTRY_SEPARATOR: &str = "\n\n";

/// Ceilings applied while rendering. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetLimits {
    pub max_entries: Option<usize>,
    pub max_tokens: Option<usize>,
}

/// The rendered injection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formatted {
    pub text: String,
    pub count: usize,
    pub total_tokens: usize,
}

/// Render entries (already priority-sorted) until a ceiling is hit.
///
/// The entry cap applies from the first entry on. The token cap never rejects
/// the first entry, so a single oversized entry still produces output.
pub fn format(entries: &[&IndexedEntry], template: &str, limits: &BudgetLimits) -> Formatted {
    let mut rendered: Vec<String> = Vec::new();
    let mut total_tokens = 0usize;

    for entry in entries {
        if let Some(cap) = limits.max_entries {
            if rendered.len() >= cap {
                break;
            }
        }
        if let Some(cap) = limits.max_tokens {
            if !rendered.is_empty() && total_tokens + entry.token_estimate > cap {
                tracing::debug!(
                    path = %entry.path,
                    tokens = entry.token_estimate,
                    used = total_tokens,
                    cap,
                    "token budget reached"
                );
                break;
            }
        }

        rendered.push(render_entry(entry, template));
        total_tokens += entry.token_estimate;
    }

    Formatted {
        count: rendered.len(),
        text: rendered.join(ENTRY_SEPARATOR),
        total_tokens,
    }
}

/// Substitute every title and content placeholder in `template`.
pub fn render_entry(entry: &IndexedEntry, template: &str) -> String {
    template
        .replace(TITLE_PLACEHOLDER, &entry.title)
        .replace(CONTENT_PLACEHOLDER, &entry.content)
}
