//! External query renderers.
//!
//! A [`QueryRenderer`] evaluates a query (a dataview block, a drawing, a
//! stat block) outside the compiler. Rendering is started, then polled:
//! [`render`] waits for the job to settle with [`wait_until`] and returns
//! whatever output the job holds at that point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;

use super::wait::{wait_until, DEFAULT_POLL_ATTEMPTS, POLL_INTERVAL};

/// Shape of the source handed to a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderKind {
    /// Body of a fenced block.
    Block,
    /// Inline expression.
    Inline,
    /// Whole note (drawings).
    File,
}

/// Request sent to a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderRequest {
    pub kind: RenderKind,
    /// Block language or integration dialect, e.g. `dataviewjs`.
    pub language: String,
    pub source: String,
    /// Vault path of the note the query belongs to.
    pub path: String,
}

/// A started rendering.
pub trait RenderJob: Send + Sync {
    fn is_settled(&self) -> bool;

    /// Output produced so far; complete once [`is_settled`](RenderJob::is_settled).
    fn output(&self) -> Result<String>;
}

#[async_trait]
pub trait QueryRenderer: Send + Sync {
    /// `Err` is treated as unavailable.
    fn is_available(&self) -> Result<bool>;

    /// Prefix that marks inline queries, e.g. `=` for `` `= this.file.name` ``.
    fn inline_prefix(&self) -> Option<String> {
        None
    }

    async fn start(&self, request: RenderRequest) -> Result<Box<dyn RenderJob>>;
}

/// How long [`render`] waits for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

/// Start `request` and wait for it within `poll`.
///
/// A job still running at the cap yields its partial output.
pub async fn render(
    renderer: &dyn QueryRenderer,
    request: RenderRequest,
    poll: PollSettings,
) -> Result<String> {
    let path = request.path.clone();
    let language = request.language.clone();
    let job = renderer.start(request).await?;
    if !wait_until(|| job.is_settled(), poll.interval, poll.max_attempts).await {
        tracing::warn!(
            path = %path,
            language = %language,
            attempts = poll.max_attempts,
            "renderer did not settle; using partial output"
        );
    }
    job.output()
}

/// Availability of an optional renderer; `None` is unavailable.
pub(crate) fn optional_available(renderer: &Option<Arc<dyn QueryRenderer>>) -> Result<bool> {
    match renderer {
        Some(r) => r.is_available(),
        None => Ok(false),
    }
}

pub(crate) fn require(renderer: &Option<Arc<dyn QueryRenderer>>) -> Result<&dyn QueryRenderer> {
    renderer
        .as_deref()
        .ok_or_else(|| anyhow!("no renderer configured"))
}

/// Renderer returning canned output, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticRenderer {
    pub available: bool,
    pub prefix: Option<String>,
    /// Output of every job; `{source}` is replaced by the request source.
    pub template: String,
}

impl StaticRenderer {
    pub fn new(template: &str) -> Self {
        Self {
            available: true,
            prefix: None,
            template: template.to_string(),
        }
    }
}

struct SettledJob(String);

impl RenderJob for SettledJob {
    fn is_settled(&self) -> bool {
        true
    }

    fn output(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[async_trait]
impl QueryRenderer for StaticRenderer {
    fn is_available(&self) -> Result<bool> {
        Ok(self.available)
    }

    fn inline_prefix(&self) -> Option<String> {
        self.prefix.clone()
    }

    async fn start(&self, request: RenderRequest) -> Result<Box<dyn RenderJob>> {
        Ok(Box::new(SettledJob(
            self.template.replace("{source}", &request.source),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct SlowJob {
        polls: Arc<AtomicU32>,
        settle_after: u32,
    }

    impl RenderJob for SlowJob {
        fn is_settled(&self) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst) + 1 >= self.settle_after
        }

        fn output(&self) -> Result<String> {
            if self.polls.load(Ordering::SeqCst) >= self.settle_after {
                Ok("done".into())
            } else {
                Ok("partial".into())
            }
        }
    }

    struct SlowRenderer {
        settle_after: u32,
    }

    #[async_trait]
    impl QueryRenderer for SlowRenderer {
        fn is_available(&self) -> Result<bool> {
            Ok(true)
        }

        async fn start(&self, _request: RenderRequest) -> Result<Box<dyn RenderJob>> {
            Ok(Box::new(SlowJob {
                polls: Arc::new(AtomicU32::new(0)),
                settle_after: self.settle_after,
            }))
        }
    }

    fn request() -> RenderRequest {
        RenderRequest {
            kind: RenderKind::Block,
            language: "dataview".into(),
            source: "LIST".into(),
            path: "a.md".into(),
        }
    }

    fn fast_poll(max_attempts: u32) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn waits_for_settled_output() {
        let renderer = SlowRenderer { settle_after: 3 };
        let out = render(&renderer, request(), fast_poll(10)).await.unwrap();
        assert_eq!(out, "done");
    }

    #[tokio::test]
    async fn unsettled_job_yields_partial_output() {
        let renderer = SlowRenderer { settle_after: 1000 };
        let out = render(&renderer, request(), fast_poll(2)).await.unwrap();
        assert_eq!(out, "partial");
    }

    #[tokio::test]
    async fn static_renderer_substitutes_source() {
        let renderer = StaticRenderer::new("<ul>{source}</ul>");
        let out = render(&renderer, request(), PollSettings::default())
            .await
            .unwrap();
        assert_eq!(out, "<ul>LIST</ul>");
    }

    #[test]
    fn request_serializes_lowercase_kind() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["kind"], "block");
        assert_eq!(json["language"], "dataview");
    }
}
