//! Drawing embeds.
//!
//! Two entry points: an inline `![[Scene.excalidraw|400]]` embed inside a
//! regular note, and drawing notes themselves, whose whole body is
//! replaced by the rendered SVG.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::renderer::{optional_available, render, require, PollSettings, QueryRenderer};
use super::renderer::{RenderKind, RenderRequest};
use super::{Integration, IntegrationContext, PatternDescriptor, PatternMatch};
use crate::markdown::frontmatter_range;
use crate::models::SourceDocument;
use crate::svg;

const EMBED_PATTERN: &str =
    r"!\[\[([^\]|#\n]+?\.excalidraw(?:\.md)?)(?:\|([^\]\n]*))?\]\]";

/// Frontmatter key the drawing plugin writes into every drawing note.
pub const PLUGIN_KEY: &str = "excalidraw-plugin";

const STYLESHEET: &str = r#".excalidraw-svg {
  max-width: 100%;
  height: auto;
}
"#;

pub struct ExcalidrawIntegration {
    renderer: Option<Arc<dyn QueryRenderer>>,
}

impl ExcalidrawIntegration {
    pub fn new(renderer: Option<Arc<dyn QueryRenderer>>) -> Self {
        Self { renderer }
    }

    async fn render_drawing(&self, path: &str, source: String) -> Result<String> {
        let renderer = require(&self.renderer)?;
        let request = RenderRequest {
            kind: RenderKind::File,
            language: "excalidraw".to_string(),
            source,
            path: path.to_string(),
        };
        render(renderer, request, PollSettings::default()).await
    }
}

/// Whether `path` names a drawing note.
pub fn is_drawing_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".excalidraw.md") || lower.ends_with(".excalidraw")
}

/// Whether `doc` is a drawing note, by path or by the plugin's frontmatter key.
pub fn is_drawing_note(doc: &SourceDocument) -> bool {
    is_drawing_path(&doc.path) || doc.metadata.frontmatter.contains_key(PLUGIN_KEY)
}

#[async_trait]
impl Integration for ExcalidrawIntegration {
    fn id(&self) -> &str {
        "excalidraw"
    }

    fn setting_key(&self) -> &str {
        "excalidraw"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn stylesheet(&self) -> Option<&str> {
        Some(STYLESHEET)
    }

    fn is_available(&self) -> Result<bool> {
        optional_available(&self.renderer)
    }

    fn patterns(&self) -> Vec<PatternDescriptor> {
        vec![PatternDescriptor::inline("excalidraw-embed", EMBED_PATTERN)]
    }

    async fn compile(&self, matched: &PatternMatch, ctx: &IntegrationContext<'_>) -> Result<String> {
        let target = matched.capture(1).unwrap_or_default();
        let path = ctx
            .vault
            .resolve_link(target, ctx.path)
            .ok_or_else(|| anyhow!("drawing not found: {}", target))?;
        let source = ctx.vault.read_text(&path).await?;
        let rendered = self.render_drawing(&path, source).await?;

        let size = matched
            .capture(2)
            .map(str::trim)
            .filter(|s| s.chars().next().is_some_and(|c| c.is_ascii_digit()));
        let sized = match size {
            Some(width) => svg::set_width(&rendered, width)?,
            None => rendered,
        };
        Ok(svg::collapse_whitespace(sized.trim()))
    }

    fn should_transform_file(&self, doc: &SourceDocument) -> bool {
        is_drawing_note(doc)
    }

    async fn transform_file(
        &self,
        doc: &SourceDocument,
        text: &str,
        _ctx: &IntegrationContext<'_>,
    ) -> Result<String> {
        let rendered = self.render_drawing(&doc.path, doc.text.clone()).await?;
        let header = frontmatter_range(text).map(|r| &text[r]).unwrap_or_default();
        Ok(format!(
            "{}{}\n",
            header,
            svg::collapse_whitespace(rendered.trim())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::renderer::StaticRenderer;
    use crate::models::DocumentMetadata;
    use crate::settings::PublishSettings;
    use crate::vault::memory::InMemoryVault;
    use regex::Regex;

    const SCENE_SVG: &str = "<svg width=\"10\" height=\"5\" viewBox=\"0 0 10 5\">\n<path d=\"M0 0\"/>\n</svg>";

    fn integration() -> ExcalidrawIntegration {
        ExcalidrawIntegration::new(Some(Arc::new(StaticRenderer::new(SCENE_SVG))))
    }

    fn matched(text: &str) -> PatternMatch {
        let caps = Regex::new(EMBED_PATTERN).unwrap().captures(text).unwrap();
        PatternMatch {
            descriptor: PatternDescriptor::inline("excalidraw-embed", EMBED_PATTERN),
            full_match: caps[0].to_string(),
            captures: caps
                .iter()
                .skip(1)
                .map(|c| c.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }

    #[test]
    fn pattern_requires_drawing_extension() {
        let re = Regex::new(EMBED_PATTERN).unwrap();
        assert!(re.is_match("![[Scene.excalidraw]]"));
        assert!(re.is_match("![[dir/Scene.excalidraw.md|300]]"));
        assert!(!re.is_match("![[Scene.md]]"));
        assert!(!re.is_match("[[Scene.excalidraw]]"));
    }

    #[tokio::test]
    async fn embed_renders_sized_inline_svg() {
        let vault = InMemoryVault::new()
            .with_note("draw/Scene.excalidraw.md", "---\nexcalidraw-plugin: parsed\n---\n# Drawing\n")
            .with_note("a.md", "![[Scene.excalidraw|300]]");
        let settings = PublishSettings::default();
        let ctx = IntegrationContext {
            path: "a.md",
            vault: &vault,
            settings: &settings,
        };
        let out = integration()
            .compile(&matched("![[Scene.excalidraw|300]]"), &ctx)
            .await
            .unwrap();
        assert!(!out.contains('\n'));
        assert!(out.contains(r#"width="300""#));
        assert!(!out.contains("height="));
    }

    #[tokio::test]
    async fn unresolved_embed_is_an_error() {
        let vault = InMemoryVault::new();
        let settings = PublishSettings::default();
        let ctx = IntegrationContext {
            path: "a.md",
            vault: &vault,
            settings: &settings,
        };
        assert!(integration()
            .compile(&matched("![[Missing.excalidraw]]"), &ctx)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn drawing_note_body_is_replaced() {
        let doc = SourceDocument {
            path: "Scene.excalidraw.md".into(),
            text: "# Drawing\n```json\n{}\n```\n".into(),
            metadata: DocumentMetadata::default(),
        };
        let vault = InMemoryVault::new();
        let settings = PublishSettings::default();
        let ctx = IntegrationContext {
            path: &doc.path,
            vault: &vault,
            settings: &settings,
        };
        let dr = integration();
        assert!(dr.should_transform_file(&doc));
        let out = dr
            .transform_file(&doc, "---\n{\"publish\":true}\n---\n# Drawing\n", &ctx)
            .await
            .unwrap();
        assert!(out.starts_with("---\n{\"publish\":true}\n---\n<svg"));
        assert!(!out.contains("# Drawing"));
    }
}
