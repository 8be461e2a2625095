//! Image embeds: SVG inlining and binary asset extraction.
//!
//! | Form | SVG | Other images |
//! |------|-----|--------------|
//! | `![[file\|meta\|size]]` | inlined markup, `size` sets `width` | `![file\|meta\|size](/img/user/…)` |
//! | `![alt](file)` | inlined markup | `![alt](/img/user/…)` |
//!
//! Remote (`http(s)://`) references and unresolvable targets are left
//! untouched. Extracted files keep their vault-relative path under
//! `/img/user/`; in text, spaces in that path become `%20`.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::markdown::{in_ranges, protected_ranges};
use crate::models::Asset;
use crate::svg;
use crate::vault::Vault;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "bmp"];

/// Prefix of every extracted asset's output path.
pub const ASSET_OUTPUT_DIR: &str = "/img/user";

static WIKI_EMBED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[\[([^\[\]\n]+?)\]\]").expect("wiki embed regex"));

static MARKDOWN_IMAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]\n]*)\]\(([^)\n]+)\)").expect("markdown image regex"));

enum Embed<'t> {
    Wiki {
        file: &'t str,
        meta: Option<&'t str>,
        size: Option<&'t str>,
    },
    Markdown {
        alt: &'t str,
        file: String,
    },
}

impl<'t> Embed<'t> {
    fn file(&self) -> &str {
        match self {
            Embed::Wiki { file, .. } => *file,
            Embed::Markdown { file, .. } => file.as_str(),
        }
    }
}

/// Every image embed outside code and frontmatter, with its byte range.
///
/// Embeds are ordered by position and never overlap; a wiki embed inside
/// a Markdown image's title belongs to that image.
fn embeds(text: &str) -> Vec<(usize, usize, Embed<'_>)> {
    let protected = protected_ranges(text);
    let mut found = Vec::new();

    for caps in WIKI_EMBED_REGEX.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if in_ranges(&protected, whole.start()) {
            continue;
        }
        let (file, rest) = match inner.as_str().split_once('|') {
            Some((file, rest)) => (file.trim(), Some(rest)),
            None => (inner.as_str().trim(), None),
        };
        let (meta, size) = split_size(rest);
        found.push((whole.start(), whole.end(), Embed::Wiki { file, meta, size }));
    }

    for caps in MARKDOWN_IMAGE_REGEX.captures_iter(text) {
        let (Some(whole), Some(alt), Some(target)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if in_ranges(&protected, whole.start()) {
            continue;
        }
        let target = markdown_target(target.as_str());
        if is_remote(target) {
            continue;
        }
        let file = percent_decode_str(target).decode_utf8_lossy().into_owned();
        found.push((
            whole.start(),
            whole.end(),
            Embed::Markdown {
                alt: alt.as_str(),
                file,
            },
        ));
    }

    found.sort_by_key(|(start, _, _)| *start);
    let mut end_of_last = 0;
    found.retain(|(start, end, _)| {
        if *start < end_of_last {
            return false;
        }
        end_of_last = *end;
        true
    });
    found
}

/// `meta` and `size` from the text after the file name's pipe.
///
/// The last segment is a size when it starts with a digit (`300`,
/// `300x200`); every segment before it is metadata, pipes included.
fn split_size(rest: Option<&str>) -> (Option<&str>, Option<&str>) {
    let Some(rest) = rest else {
        return (None, None);
    };
    match rest.rsplit_once('|') {
        Some((meta, last)) if starts_with_digit(last) => (Some(meta.trim()), Some(last.trim())),
        None if starts_with_digit(rest) => (None, Some(rest.trim())),
        _ => (Some(rest.trim()), None),
    }
}

fn starts_with_digit(s: &str) -> bool {
    s.trim().chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Link target of `![alt](target "title")`, without title or angle brackets.
fn markdown_target(raw: &str) -> &str {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_prefix('<').and_then(|r| r.split_once('>')) {
        return inner.0;
    }
    match raw.find(" \"") {
        Some(i) => &raw[..i],
        None => raw,
    }
}

fn is_remote(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

fn extension(path: &str) -> String {
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Replace SVG embeds with their markup, collapsed onto one line.
pub async fn inline_svgs(text: &str, from_path: &str, vault: &dyn Vault) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for (start, end, embed) in embeds(text) {
        if extension(embed.file()) != "svg" {
            continue;
        }
        let Some(path) = vault.resolve_link(embed.file(), from_path) else {
            continue;
        };
        let bytes = match vault.read_bytes(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path, from = from_path, error = %e, "cannot read svg");
                continue;
            }
        };
        let markup = String::from_utf8_lossy(&bytes).into_owned();
        let markup = match &embed {
            Embed::Wiki { size: Some(size), .. } => match svg::set_width(&markup, size) {
                Ok(sized) => sized,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "cannot resize svg");
                    markup
                }
            },
            _ => markup,
        };
        out.push_str(&text[last..start]);
        out.push_str(&svg::collapse_whitespace(markup.trim()));
        last = end;
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Extract image embeds as assets and point the text at their output paths.
pub async fn extract_assets(
    text: &str,
    from_path: &str,
    vault: &dyn Vault,
) -> Result<(String, Vec<Asset>)> {
    let mut out = String::with_capacity(text.len());
    let mut assets = Vec::new();
    let mut seen = BTreeSet::new();
    let mut last = 0;

    for (start, end, embed) in embeds(text) {
        if !IMAGE_EXTENSIONS.contains(&extension(embed.file()).as_str()) {
            continue;
        }
        let Some(path) = vault.resolve_link(embed.file(), from_path) else {
            tracing::debug!(link = embed.file(), from = from_path, "image not found");
            continue;
        };
        let bytes = match vault.read_bytes(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path, from = from_path, error = %e, "cannot read image");
                continue;
            }
        };

        let output_path = format!("{}/{}", ASSET_OUTPUT_DIR, path);
        let link = output_path.replace(' ', "%20");
        let replacement = match &embed {
            Embed::Wiki { meta, size, .. } => {
                let name = path.rsplit('/').next().unwrap_or(&path);
                let alt: Vec<&str> = [Some(name), *meta, *size].into_iter().flatten().collect();
                format!("![{}]({})", alt.join("|"), link)
            }
            Embed::Markdown { alt, .. } => format!("![{}]({})", alt, link),
        };
        if seen.insert(output_path.clone()) {
            assets.push(Asset {
                output_path,
                content_base64: STANDARD.encode(&bytes),
                remote_hash: None,
            });
        }

        out.push_str(&text[last..start]);
        out.push_str(&replacement);
        last = end;
    }
    out.push_str(&text[last..]);
    Ok((out, assets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::memory::InMemoryVault;

    const SVG: &str = "<svg width=\"1\" height=\"1\">\n  <rect/>\n</svg>\n";

    fn vault() -> InMemoryVault {
        InMemoryVault::new()
            .with_note("notes/a.md", "")
            .with_file("My Images/test image.png", &[1, 2, 3])
            .with_file("notes/pics/cat.jpg", &[4, 5])
            .with_file("shapes/logo.svg", SVG.as_bytes())
    }

    #[test]
    fn size_disambiguation() {
        assert_eq!(split_size(None), (None, None));
        assert_eq!(split_size(Some("300")), (None, Some("300")));
        assert_eq!(split_size(Some("right")), (Some("right"), None));
        assert_eq!(split_size(Some("right|300x200")), (Some("right"), Some("300x200")));
        assert_eq!(split_size(Some("left|caption")), (Some("left|caption"), None));
        assert_eq!(split_size(Some("a|b|300")), (Some("a|b"), Some("300")));
    }

    #[tokio::test]
    async fn asset_paths_encode_spaces_only() {
        let v = vault();
        let (text, assets) = extract_assets("![[test image.png]]", "notes/a.md", &v)
            .await
            .unwrap();
        assert_eq!(text, "![test image.png](/img/user/My%20Images/test%20image.png)");
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].output_path, "/img/user/My Images/test image.png");
        assert_eq!(assets[0].content_base64, "AQID");
    }

    #[tokio::test]
    async fn wiki_meta_and_size_are_kept_in_alt() {
        let v = vault();
        let (text, _) = extract_assets("![[cat.jpg|left|200]]", "notes/a.md", &v)
            .await
            .unwrap();
        assert_eq!(text, "![cat.jpg|left|200](/img/user/notes/pics/cat.jpg)");

        let (text, _) = extract_assets("![[cat.jpg|left|framed|300]]", "notes/a.md", &v)
            .await
            .unwrap();
        assert_eq!(text, "![cat.jpg|left|framed|300](/img/user/notes/pics/cat.jpg)");
    }

    #[tokio::test]
    async fn wiki_embed_in_image_title_belongs_to_the_image() {
        let v = vault();
        let (text, assets) = extract_assets(
            "![a](pics/cat.jpg \"see ![[test image.png]]\") after",
            "notes/a.md",
            &v,
        )
        .await
        .unwrap();
        assert_eq!(text, "![a](/img/user/notes/pics/cat.jpg) after");
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].output_path, "/img/user/notes/pics/cat.jpg");

        let out = inline_svgs("![l](../shapes/logo.svg \"![[logo.svg]]\") after", "notes/a.md", &v)
            .await
            .unwrap();
        assert!(out.starts_with("<svg "));
        assert!(out.ends_with("</svg> after"));
    }

    #[tokio::test]
    async fn markdown_images_decode_and_collapse_parents() {
        let v = vault();
        let (text, assets) = extract_assets(
            "![a](../My%20Images/test%20image.png) ![b](pics/cat.jpg \"Cat\") ![c](https://x.org/y.png)",
            "notes/a.md",
            &v,
        )
        .await
        .unwrap();
        assert_eq!(
            text,
            "![a](/img/user/My%20Images/test%20image.png) ![b](/img/user/notes/pics/cat.jpg) ![c](https://x.org/y.png)"
        );
        assert_eq!(assets.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_embeds_yield_one_asset() {
        let v = vault();
        let (_, assets) = extract_assets("![[cat.jpg]] ![[cat.jpg|100]]", "notes/a.md", &v)
            .await
            .unwrap();
        assert_eq!(assets.len(), 1);
    }

    #[tokio::test]
    async fn unresolved_and_code_embeds_are_left() {
        let v = vault();
        let text = "![[nope.png]] `![[cat.jpg]]`";
        let (out, assets) = extract_assets(text, "notes/a.md", &v).await.unwrap();
        assert_eq!(out, text);
        assert!(assets.is_empty());
    }

    #[tokio::test]
    async fn svg_is_inlined_with_width() {
        let v = vault();
        let out = inline_svgs("before ![[logo.svg|120]] after", "notes/a.md", &v)
            .await
            .unwrap();
        assert!(out.starts_with("before <svg "));
        assert!(out.contains(r#"width="120""#));
        assert!(out.ends_with("</svg> after"));
        assert!(!out.contains('\n'));

        let out = inline_svgs("![logo](../shapes/logo.svg)", "notes/a.md", &v)
            .await
            .unwrap();
        assert!(out.contains(r#"width="1""#));
    }
}
