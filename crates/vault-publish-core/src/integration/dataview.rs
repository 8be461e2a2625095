//! Tabular queries: `dataview` / `dataviewjs` blocks and inline expressions.
//!
//! The inline prefix is asked from the renderer on every call, so a
//! changed prefix takes effect on the next document.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::renderer::{optional_available, render, require, PollSettings, QueryRenderer};
use super::renderer::{RenderKind, RenderRequest};
use super::{fenced_block_pattern, Integration, IntegrationContext, PatternDescriptor, PatternMatch};

const DEFAULT_INLINE_PREFIX: &str = "=";
const JS_INLINE_PREFIX: &str = "$=";

const STYLESHEET: &str = r#".dataview.table-view-table {
  width: 100%;
  border-collapse: collapse;
}
.dataview.table-view-table th,
.dataview.table-view-table td {
  padding: 0.25rem 0.5rem;
  text-align: left;
}
.dataview.inline-field-key {
  font-weight: 600;
}
.dataview.result-group {
  padding-left: 0.5rem;
}
"#;

pub struct DataviewIntegration {
    renderer: Option<Arc<dyn QueryRenderer>>,
}

impl DataviewIntegration {
    pub fn new(renderer: Option<Arc<dyn QueryRenderer>>) -> Self {
        Self { renderer }
    }

    fn inline_prefix(&self) -> String {
        self.renderer
            .as_ref()
            .and_then(|r| r.inline_prefix())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_INLINE_PREFIX.to_string())
    }
}

#[async_trait]
impl Integration for DataviewIntegration {
    fn id(&self) -> &str {
        "dataview"
    }

    fn setting_key(&self) -> &str {
        "dataview"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn stylesheet(&self) -> Option<&str> {
        Some(STYLESHEET)
    }

    fn is_available(&self) -> Result<bool> {
        optional_available(&self.renderer)
    }

    fn patterns(&self) -> Vec<PatternDescriptor> {
        vec![
            PatternDescriptor::block("dataview-block", fenced_block_pattern(&["dataview", "dataviewjs"])),
            PatternDescriptor::inline(
                "dataviewjs-inline",
                format!(r"`{}([^`\n]+)`", regex::escape(JS_INLINE_PREFIX)),
            ),
            PatternDescriptor::inline(
                "dataview-inline",
                format!(r"`{}([^`\n]+)`", regex::escape(&self.inline_prefix())),
            ),
        ]
    }

    async fn compile(&self, matched: &PatternMatch, ctx: &IntegrationContext<'_>) -> Result<String> {
        let renderer = require(&self.renderer)?;
        let (kind, language, source) = match matched.descriptor.id.as_str() {
            "dataview-block" => (
                RenderKind::Block,
                matched.capture(1).unwrap_or("dataview"),
                matched.capture(2).unwrap_or_default(),
            ),
            "dataviewjs-inline" => (
                RenderKind::Inline,
                "dataviewjs",
                matched.capture(1).unwrap_or_default(),
            ),
            "dataview-inline" => (
                RenderKind::Inline,
                "dataview",
                matched.capture(1).unwrap_or_default(),
            ),
            other => bail!("unknown dataview pattern {}", other),
        };
        let request = RenderRequest {
            kind,
            language: language.to_string(),
            source: source.trim().to_string(),
            path: ctx.path.to_string(),
        };
        let output = render(renderer, request, PollSettings::default()).await?;
        Ok(output.trim().to_string())
    }
}
