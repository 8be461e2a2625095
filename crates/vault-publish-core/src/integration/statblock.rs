//! Creature stat blocks: ```` ```statblock ```` fences.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::renderer::{optional_available, render, require, PollSettings, QueryRenderer};
use super::renderer::{RenderKind, RenderRequest};
use super::{fenced_block_pattern, Integration, IntegrationContext, PatternDescriptor, PatternMatch};

const STYLESHEET: &str = r#".statblock {
  border: 2px solid var(--secondary);
  border-radius: 4px;
  padding: 0.5rem 1rem;
  margin: 1rem 0;
}
.statblock .property-name {
  font-weight: 700;
}
.statblock .section-header {
  border-bottom: 1px solid var(--secondary);
  font-variant: small-caps;
}
"#;

pub struct StatblockIntegration {
    renderer: Option<Arc<dyn QueryRenderer>>,
}

impl StatblockIntegration {
    pub fn new(renderer: Option<Arc<dyn QueryRenderer>>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Integration for StatblockIntegration {
    fn id(&self) -> &str {
        "fantasy-statblocks"
    }

    fn setting_key(&self) -> &str {
        "fantasy_statblocks"
    }

    fn priority(&self) -> i32 {
        40
    }

    fn stylesheet(&self) -> Option<&str> {
        Some(STYLESHEET)
    }

    fn is_available(&self) -> Result<bool> {
        optional_available(&self.renderer)
    }

    fn patterns(&self) -> Vec<PatternDescriptor> {
        vec![PatternDescriptor::block(
            "statblock",
            fenced_block_pattern(&["statblock"]),
        )]
    }

    async fn compile(&self, matched: &PatternMatch, ctx: &IntegrationContext<'_>) -> Result<String> {
        let renderer = require(&self.renderer)?;
        let request = RenderRequest {
            kind: RenderKind::Block,
            language: "statblock".to_string(),
            source: matched.capture(2).unwrap_or_default().to_string(),
            path: ctx.path.to_string(),
        };
        let html = render(renderer, request, PollSettings::default()).await?;
        // Blank lines would end the HTML block in Markdown.
        Ok(html
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
