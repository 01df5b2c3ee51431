//! Body cleanup and title derivation.
//!
//! [`sanitize`] strips vault embed and link markup so the text reads as plain
//! prose inside a prompt. [`resolve_title`] picks a display title for an entry.

use std::sync::LazyLock;

use regex::Regex;

static EMBED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[\[.*?\]\]").expect("valid embed pattern"));

static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid image pattern"));

static ALIASED_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]|]*)\|([^\]]*)\]\]").expect("valid aliased link pattern")
});

static BARE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]*)\]\]").expect("valid link pattern"));

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline pattern"));

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.+)$").expect("valid heading pattern"));

/// Extension stripped from path-derived titles unless the vault uses another.
pub const DOCUMENT_EXTENSION: &str = ".md";

/// Strip embed/link markup from a note body.
///
/// The ordered pass is repeated until the text stops changing, so removing one
/// marker can never leave a freshly formed marker behind. Every pass that
/// changes anything also shortens the text, so the loop always terminates.
pub fn sanitize(body: &str) -> String {
    let mut current = sanitize_once(body);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(text: &str) -> String {
    let text = EMBED.replace_all(text, "");
    let text = IMAGE.replace_all(&text, "");
    let text = ALIASED_LINK.replace_all(&text, "$2");
    let text = BARE_LINK.replace_all(&text, "$1");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Derive a display title from the first `# Heading` line, falling back to the
/// last segment of `fallback` with its `.md` extension removed.
pub fn resolve_title(body: &str, fallback: &str) -> String {
    resolve_title_with(body, fallback, DOCUMENT_EXTENSION)
}

/// [`resolve_title`] for vaults whose notes use a different extension.
pub fn resolve_title_with(body: &str, fallback: &str, extension: &str) -> String {
    if let Some(caps) = HEADING.captures(body) {
        let heading = caps[1].trim();
        if !heading.is_empty() {
            return heading.to_string();
        }
    }

    let segment = fallback.rsplit(['/', '\\']).next().unwrap_or(fallback);
    strip_extension(segment, extension).to_string()
}

/// Remove a trailing extension, compared case-insensitively.
pub(crate) fn strip_extension<'a>(name: &'a str, extension: &str) -> &'a str {
    if name.len() > extension.len() {
        let split = name.len() - extension.len();
        if name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(extension) {
            return &name[..split];
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_embeds_and_images() {
        assert_eq!(sanitize("before ![[img.png]] after"), "before  after");
        assert_eq!(sanitize("see ![alt text](http://x/y.png) here"), "see  here");
        assert_eq!(sanitize("![[img.png]]"), "");
    }

    #[test]
    fn rewrites_links() {
        assert_eq!(sanitize("[[A|B]]"), "B");
        assert_eq!(sanitize("[[A]]"), "A");
        assert_eq!(
            sanitize("Ask [[People/Eris|Eris]] about [[Discordia]]."),
            "Ask Eris about Discordia."
        );
    }

    #[test]
    fn collapses_newlines_and_trims() {
        assert_eq!(sanitize("\n\n  a\n\n\n\n\nb  \n\n"), "a\n\nb");
        assert_eq!(sanitize("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn embed_removal_precedes_link_rewrite() {
        assert_eq!(sanitize("x ![[Note|alias]] y"), "x  y");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "plain text",
            "[[[[nested]]]]",
            "![[a]][[b|c]]\n\n\n\n[[d]]",
            "[![[x]][y]]",
            "!![[[inner]]]]",
            "  ![a](b)![[c]]  ",
            "\n\n\n",
            "[[a|b|c]]",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn title_from_first_heading() {
        let body = "Intro\n# Eris\nmore\n# Second";
        assert_eq!(resolve_title(body, "People/eris.md"), "Eris");
    }

    #[test]
    fn subheadings_do_not_count() {
        let body = "## Not a title\n#hashtag";
        assert_eq!(resolve_title(body, "People/Eris of Discord.md"), "Eris of Discord");
    }

    #[test]
    fn title_fallback_strips_extension_case_insensitively() {
        assert_eq!(resolve_title("", "Lore/Places/Thera.MD"), "Thera");
        assert_eq!(resolve_title("", "notes.txt"), "notes.txt");
        assert_eq!(resolve_title("", ".md"), ".md");
        assert_eq!(resolve_title_with("", "a/b.markdown", ".markdown"), "b");
    }
}
