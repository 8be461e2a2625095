//! Reactive queries: `datacore`, `datacorejs` and `datacorejsx` blocks.
//!
//! These render asynchronously and routinely take longer than a static
//! query, so the wait is capped at about five seconds instead of the
//! default half second.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::renderer::{optional_available, render, require, PollSettings, QueryRenderer};
use super::renderer::{RenderKind, RenderRequest};
use super::wait::POLL_INTERVAL;
use super::{fenced_block_pattern, Integration, IntegrationContext, PatternDescriptor, PatternMatch};

const POLL_ATTEMPTS: u32 = 1000;

const STYLESHEET: &str = r#".datacore-table {
  width: 100%;
  border-collapse: collapse;
}
.datacore-table th,
.datacore-table td {
  padding: 0.25rem 0.5rem;
}
.datacore-card {
  border: 1px solid var(--lightgray);
  border-radius: 6px;
  padding: 0.5rem 1rem;
}
"#;

pub struct DatacoreIntegration {
    renderer: Option<Arc<dyn QueryRenderer>>,
}

impl DatacoreIntegration {
    pub fn new(renderer: Option<Arc<dyn QueryRenderer>>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Integration for DatacoreIntegration {
    fn id(&self) -> &str {
        "datacore"
    }

    fn setting_key(&self) -> &str {
        "datacore"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn stylesheet(&self) -> Option<&str> {
        Some(STYLESHEET)
    }

    fn is_available(&self) -> Result<bool> {
        optional_available(&self.renderer)
    }

    fn patterns(&self) -> Vec<PatternDescriptor> {
        vec![PatternDescriptor::block(
            "datacore-block",
            fenced_block_pattern(&["datacorejsx", "datacorejs", "datacore"]),
        )]
    }

    async fn compile(&self, matched: &PatternMatch, ctx: &IntegrationContext<'_>) -> Result<String> {
        let renderer = require(&self.renderer)?;
        let request = RenderRequest {
            kind: RenderKind::Block,
            language: matched.capture(1).unwrap_or("datacore").to_string(),
            source: matched.capture(2).unwrap_or_default().to_string(),
            path: ctx.path.to_string(),
        };
        let poll = PollSettings {
            interval: POLL_INTERVAL,
            max_attempts: POLL_ATTEMPTS,
        };
        Ok(render(renderer, request, poll).await?.trim().to_string())
    }
}
