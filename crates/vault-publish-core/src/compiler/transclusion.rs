//! Transclusion expansion.
//!
//! Each `![[note]]`, `![[note#Heading]]` or `![[note#^block]]` embed of a
//! Markdown note is replaced by the referenced content:
//!
//! ```text
//! ![[target#anchor]]
//!   │ resolve ──▶ none / not Markdown / drawing ──▶ leave as is
//!   ▼
//! slice: whole note │ heading section │ block lines
//!   ▼
//! strip frontmatter ─▶ strip ^block ids ─▶ scope vault links
//!   ▼
//! expand(fragment, depth + 1) ─▶ splice in place of the embed
//! ```
//!
//! Expansion stops at [`MAX_TRANSCLUSION_DEPTH`]; deeper embeds stay as
//! literal text, which also ends self-referential chains.

use std::sync::LazyLock;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;

use super::links::{scope_vault_links, split_display};
use crate::integration::excalidraw::{is_drawing_note, is_drawing_path};
use crate::markdown::{in_ranges, normalize_heading, protected_ranges, strip_block_ids, strip_frontmatter};
use crate::models::SourceDocument;
use crate::settings::PublishSettings;
use crate::vault::{is_markdown, Vault};

/// Levels of nested transclusion that are expanded.
pub const MAX_TRANSCLUSION_DEPTH: usize = 4;

static EMBED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[\[([^\[\]\n]+?)\]\]").expect("embed regex"));

/// Expand every transclusion in `text`, written in `from_path`.
///
/// `depth` is the nesting level of `text` itself; the top-level note is
/// expanded with depth 0.
pub fn expand<'a>(
    vault: &'a dyn Vault,
    settings: &'a PublishSettings,
    text: String,
    from_path: String,
    depth: usize,
) -> BoxFuture<'a, Result<String>> {
    async move {
        if depth >= MAX_TRANSCLUSION_DEPTH {
            return Ok(text);
        }
        let protected = protected_ranges(&text);
        let embeds: Vec<(usize, usize, String)> = EMBED_REGEX
            .captures_iter(&text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                (!in_ranges(&protected, whole.start()))
                    .then(|| (whole.start(), whole.end(), caps[1].to_string()))
            })
            .collect();

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (start, end, inner) in embeds {
            let Some(fragment) = fragment(vault, settings, &inner, &from_path, depth).await? else {
                continue;
            };
            out.push_str(&text[last..start]);
            out.push_str(&fragment);
            last = end;
        }
        out.push_str(&text[last..]);
        Ok(out)
    }
    .boxed()
}

/// Expanded content for one embed, `None` to leave the embed untouched.
async fn fragment(
    vault: &dyn Vault,
    settings: &PublishSettings,
    inner: &str,
    from_path: &str,
    depth: usize,
) -> Result<Option<String>> {
    let (link, _, _) = split_display(inner);
    let Some(path) = vault.resolve_link(link, from_path) else {
        return Ok(None);
    };
    if !is_markdown(&path) || is_drawing_path(&path) {
        return Ok(None);
    }
    let doc = match vault.read_document(&path).await {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(path = %path, from = from_path, error = %e, "cannot read transcluded note");
            return Ok(None);
        }
    };
    if is_drawing_note(&doc) {
        return Ok(None);
    }

    let sliced = match link.find('#') {
        Some(i) => match slice_anchor(&doc, &link[i + 1..]) {
            Some(s) => s,
            None => {
                tracing::debug!(link, from = from_path, "transclusion anchor not found");
                return Ok(None);
            }
        },
        None => strip_frontmatter(&doc.text).to_string(),
    };

    let cleaned = strip_block_ids(strip_frontmatter(&sliced));
    let scoped = scope_vault_links(&cleaned, settings);
    let expanded = expand(vault, settings, scoped, path, depth + 1).await?;
    Ok(Some(expanded.trim_matches(['\n', '\r']).to_string()))
}

/// Lines of `doc` selected by a `^block` or heading anchor.
fn slice_anchor(doc: &SourceDocument, anchor: &str) -> Option<String> {
    let lines: Vec<&str> = doc.text.split('\n').collect();

    if let Some(block_id) = anchor.strip_prefix('^') {
        let block = doc.metadata.blocks.get(block_id.trim())?;
        let end = block.end_line.min(lines.len().saturating_sub(1));
        return Some(lines.get(block.start_line..=end)?.join("\n"));
    }

    // Nested heading anchors (`#A#B`) target the last heading.
    let wanted = normalize_heading(anchor.rsplit('#').next().unwrap_or(anchor));
    let headings = &doc.metadata.headings;
    let index = headings
        .iter()
        .position(|h| normalize_heading(&h.text) == wanted)?;
    let heading = &headings[index];
    let end = headings[index + 1..]
        .iter()
        .find(|h| h.level <= heading.level)
        .map(|h| h.line)
        .unwrap_or(lines.len());
    Some(lines.get(heading.line..end)?.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::memory::InMemoryVault;
    use crate::vault::DocumentStore;

    async fn run(vault: &InMemoryVault, settings: &PublishSettings, path: &str) -> String {
        let text = vault.read_text(path).await.unwrap();
        expand(vault, settings, text, path.to_string(), 0).await.unwrap()
    }

    #[tokio::test]
    async fn inlines_whole_note_without_frontmatter() {
        let vault = InMemoryVault::new()
            .with_note("a.md", "Before\n![[b]]\nAfter")
            .with_note("b.md", "---\ntitle: B\n---\nBody of b ^id1\n");
        let out = run(&vault, &PublishSettings::default(), "a.md").await;
        assert_eq!(out, "Before\nBody of b\nAfter");
    }

    #[tokio::test]
    async fn block_reference_slices_tagged_line() {
        let vault = InMemoryVault::new()
            .with_note("a.md", "![[note#^abc123]]")
            .with_note("note.md", "# Title\n\nFirst paragraph.\n\nTagged line ^abc123\n\nLast.\n");
        let out = run(&vault, &PublishSettings::default(), "a.md").await;
        assert_eq!(out, "Tagged line");
    }

    #[tokio::test]
    async fn heading_reference_stops_at_same_level() {
        let vault = InMemoryVault::new()
            .with_note("a.md", "![[note#Part: One]]")
            .with_note(
                "note.md",
                "# Top\n## Part One\ntext\n### Sub\nmore\n## Part Two\nother\n",
            );
        let out = run(&vault, &PublishSettings::default(), "a.md").await;
        assert_eq!(out, "## Part One\ntext\n### Sub\nmore");
    }

    #[tokio::test]
    async fn depth_is_bounded_for_self_reference() {
        let vault = InMemoryVault::new().with_note("loop.md", "x ![[loop]]");
        let out = run(&vault, &PublishSettings::default(), "loop.md").await;
        assert_eq!(out, "x x x x x ![[loop]]");
    }

    #[tokio::test]
    async fn leaves_unresolvable_assets_and_code() {
        let text = "![[missing]] ![[pic.png]] `![[b]]` ![[b#^nope]]";
        let vault = InMemoryVault::new()
            .with_note("a.md", text)
            .with_note("b.md", "b")
            .with_file("pic.png", b"png");
        let out = run(&vault, &PublishSettings::default(), "a.md").await;
        assert_eq!(out, text);
    }

    #[tokio::test]
    async fn fragments_are_vault_scoped() {
        let settings = PublishSettings {
            vault_path: "sub".into(),
            ..Default::default()
        };
        let vault = InMemoryVault::new()
            .with_note("sub/a.md", "![[b]]")
            .with_note("sub/b.md", "see [[sub/c]]");
        let out = run(&vault, &settings, "sub/a.md").await;
        assert_eq!(out, "see [[c]]");
    }

    #[tokio::test]
    async fn drawings_marked_in_frontmatter_are_not_inlined() {
        let text = "Before ![[Scene]] after";
        let vault = InMemoryVault::new()
            .with_note("a.md", text)
            .with_note(
                "Scene.md",
                "---\nexcalidraw-plugin: parsed\n---\n# Drawing\n```json\n{\"elements\":[]}\n```\n",
            );
        let out = run(&vault, &PublishSettings::default(), "a.md").await;
        assert_eq!(out, text);
    }

    #[tokio::test]
    async fn display_math_is_spliced_literally() {
        let vault = InMemoryVault::new()
            .with_note("a.md", "![[m]]")
            .with_note("m.md", "$$\nx^2\n$$");
        let out = run(&vault, &PublishSettings::default(), "a.md").await;
        assert_eq!(out, "$$\nx^2\n$$");
    }
}
