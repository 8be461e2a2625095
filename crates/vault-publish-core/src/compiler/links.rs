//! Wiki-link rewriting.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::markdown::{in_ranges, protected_ranges};
use crate::settings::PublishSettings;
use crate::vault::resolve::link_target;
use crate::vault::{extensionless, is_markdown, Vault};

static WIKI_LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[\[([^\[\]\n]+?)\]\]").expect("wiki link regex"));

static TARGET_BLANK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+(?:target="_blank"|rel="noopener(?: noreferrer)?")"#).expect("target blank regex")
});

/// Link, separator and display text of a wiki-link body.
///
/// A table-escaped `\|` separator is returned as written.
pub(crate) fn split_display(inner: &str) -> (&str, &str, Option<&str>) {
    match inner.find('|') {
        Some(i) if i > 0 && inner.as_bytes()[i - 1] == b'\\' => {
            (&inner[..i - 1], "\\|", Some(&inner[i + 1..]))
        }
        Some(i) => (&inner[..i], "|", Some(&inner[i + 1..])),
        None => (inner, "", None),
    }
}

/// Rewrite `[[link]]` references to the resolved note's full extensionless
/// path, keeping any `#heading`/`#^block` anchor and display text.
///
/// Embeds, links inside code or frontmatter, unresolved links and links
/// to non-Markdown files are left alone.
pub fn rewrite_full_paths(text: &str, from_path: &str, vault: &dyn Vault) -> String {
    let protected = protected_ranges(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in WIKI_LINK_REGEX.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if !caps[1].is_empty() || in_ranges(&protected, whole.start()) {
            continue;
        }
        let Some(rewritten) = rewrite_one(&caps[2], from_path, vault) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&rewritten);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

fn rewrite_one(inner: &str, from_path: &str, vault: &dyn Vault) -> Option<String> {
    let (link, separator, display) = split_display(inner);
    if link_target(link).is_empty() {
        return None;
    }
    let resolved = vault.resolve_link(link, from_path)?;
    if !is_markdown(&resolved) {
        return None;
    }
    let anchor = link.find('#').map(|i| link[i..].trim_end()).unwrap_or("");
    let mut out = format!("[[{}{}", extensionless(&resolved), anchor);
    if let Some(display) = display {
        out.push_str(separator);
        out.push_str(display);
    }
    out.push_str("]]");
    Some(out)
}

/// Strip the configured vault folder from wiki links and Markdown link
/// targets, so `[[sub/rest]]` becomes `[[rest]]` and `[t](sub/rest)`
/// becomes `[t](rest)`. A root vault path leaves the text as is.
pub fn scope_vault_links(text: &str, settings: &PublishSettings) -> String {
    let Some(prefix) = settings.vault_prefix() else {
        return text.to_string();
    };
    let escaped = regex::escape(&prefix);
    let pattern = format!(r"(\[\[|\]\(/?){}", escaped);
    match Regex::new(&pattern) {
        Ok(re) => re
            .replace_all(text, |caps: &Captures| caps[1].trim_end_matches('/').to_string())
            .into_owned(),
        Err(e) => {
            tracing::warn!(prefix = %prefix, error = %e, "cannot build vault scoping pattern");
            text.to_string()
        }
    }
}

/// Remove `target="_blank"` and `rel="noopener"` attributes from HTML links.
pub fn strip_target_blank(text: &str) -> String {
    TARGET_BLANK_REGEX.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::memory::InMemoryVault;

    fn vault() -> InMemoryVault {
        InMemoryVault::new()
            .with_note("sub/a.md", "")
            .with_note("sub/b.md", "")
            .with_note("sub/topics/Deep Note.md", "")
            .with_file("sub/img.png", b"\x89PNG")
    }

    #[test]
    fn rewrites_to_full_path_keeping_anchor_and_display() {
        let v = vault();
        let out = rewrite_full_paths(
            "See [[Deep Note#Part 2|there]] and [[b#^x1]].",
            "sub/a.md",
            &v,
        );
        assert_eq!(out, "See [[sub/topics/Deep Note#Part 2|there]] and [[sub/b#^x1]].");
    }

    #[test]
    fn keeps_escaped_table_pipe() {
        let v = vault();
        let out = rewrite_full_paths("| [[b\\|B]] |", "sub/a.md", &v);
        assert_eq!(out, "| [[sub/b\\|B]] |");
    }

    #[test]
    fn leaves_unresolved_embeds_and_code() {
        let v = vault();
        let text = "[[missing]] ![[b]] [[img.png]] `[[b]]`\n```\n[[b]]\n```\n";
        assert_eq!(rewrite_full_paths(text, "sub/a.md", &v), text);
    }

    #[test]
    fn scoping_strips_vault_prefix() {
        let settings = PublishSettings {
            vault_path: "sub/".into(),
            ..Default::default()
        };
        assert_eq!(
            scope_vault_links("[[sub/b]] ![[sub/x.png]] [t](sub/c.md) [u](/sub/d)", &settings),
            "[[b]] ![[x.png]] [t](c.md) [u](d)"
        );
        assert_eq!(
            scope_vault_links("[[sub/b]]", &PublishSettings::default()),
            "[[sub/b]]"
        );
    }

    #[test]
    fn strips_target_blank() {
        assert_eq!(
            strip_target_blank(r#"<a href="x" target="_blank" rel="noopener noreferrer">x</a>"#),
            r#"<a href="x">x</a>"#
        );
    }
}
