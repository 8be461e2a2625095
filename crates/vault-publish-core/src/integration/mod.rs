//! Pluggable content-transform providers.
//!
//! An [`Integration`] recognizes a text pattern (usually a fenced code
//! block in its own dialect) and replaces each match with rendered output.
//! Integrations are gated by a settings key, checked for availability, and
//! run in ascending priority order by the pattern compiler.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 IntegrationRegistry                  │
//! │  ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌───────────┐  │
//! │  │dataview │ │datacore │ │excalidraw│ │statblocks │  │
//! │  │   10    │ │   20    │ │    30    │ │    40     │  │
//! │  └────┬────┘ └────┬────┘ └────┬─────┘ └─────┬─────┘  │
//! │       └───────────┴─────┬─────┴─────────────┘        │
//! │                  QueryRenderer        card-link (50) │
//! └──────────────────────────┬───────────────────────────┘
//!                            ▼
//!            compiler::patterns → compiled text
//! ```
//!
//! Renderer-backed integrations delegate the actual evaluation to a
//! [`QueryRenderer`](renderer::QueryRenderer); without one they report
//! themselves unavailable and are skipped.

pub mod card_link;
pub mod datacore;
pub mod dataview;
pub mod excalidraw;
pub mod registry;
pub mod renderer;
pub mod statblock;
pub mod wait;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::SourceDocument;
use crate::settings::PublishSettings;
use crate::vault::Vault;

pub use registry::{IntegrationRegistry, RendererSet};

// ═══════════════════════════════════════════════════════════════════════
// Patterns
// ═══════════════════════════════════════════════════════════════════════

/// Whether a pattern spans whole lines or sits inside a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Block,
    Inline,
}

/// A regex declared by an integration.
///
/// The pattern is kept as source text and compiled fresh for every
/// document, so integrations can derive it from runtime state (for
/// example a renderer's configured inline prefix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDescriptor {
    pub id: String,
    pub pattern: String,
    pub kind: PatternKind,
}

impl PatternDescriptor {
    pub fn block(id: &str, pattern: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            pattern: pattern.into(),
            kind: PatternKind::Block,
        }
    }

    pub fn inline(id: &str, pattern: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            pattern: pattern.into(),
            kind: PatternKind::Inline,
        }
    }
}

/// One match of a [`PatternDescriptor`] against a document snapshot.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub descriptor: PatternDescriptor,
    pub full_match: String,
    /// Capture groups in order, starting with group 1.
    pub captures: Vec<Option<String>>,
}

impl PatternMatch {
    /// Capture group `index` (1-based, like the regex), if it participated.
    pub fn capture(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.captures.get(i))
            .and_then(|c| c.as_deref())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Integration Trait
// ═══════════════════════════════════════════════════════════════════════

/// What an integration sees while compiling a match.
pub struct IntegrationContext<'a> {
    /// Vault path of the note being compiled.
    pub path: &'a str,
    pub vault: &'a dyn Vault,
    pub settings: &'a PublishSettings,
}

/// A content-transform provider.
///
/// # Lifecycle
///
/// 1. Registered once via [`IntegrationRegistry::register`].
/// 2. Per document, the registry filters by the settings gate and
///    [`is_available`](Integration::is_available).
/// 3. [`transform_file`](Integration::transform_file) runs for documents
///    accepted by [`should_transform_file`](Integration::should_transform_file).
/// 4. Every match of every declared pattern is passed to
///    [`compile`](Integration::compile); an `Err` leaves the match as is.
#[async_trait]
pub trait Integration: Send + Sync {
    /// Stable identifier, also used for the uploaded stylesheet name.
    fn id(&self) -> &str;

    /// Key in `[publish.integrations]` that enables this integration.
    fn setting_key(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> i32;

    /// Stylesheet to publish alongside the notes.
    fn stylesheet(&self) -> Option<&str> {
        None
    }

    /// Whether the integration can run right now.
    ///
    /// Callers treat `Err` as unavailable.
    fn is_available(&self) -> Result<bool>;

    /// Patterns to apply, evaluated afresh for every document.
    fn patterns(&self) -> Vec<PatternDescriptor>;

    /// Replacement text for one match.
    async fn compile(&self, matched: &PatternMatch, ctx: &IntegrationContext<'_>)
        -> Result<String>;

    fn should_transform_file(&self, _doc: &SourceDocument) -> bool {
        false
    }

    /// Rewrite the whole document before pattern matching.
    async fn transform_file(
        &self,
        _doc: &SourceDocument,
        text: &str,
        _ctx: &IntegrationContext<'_>,
    ) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Fenced block regex for a set of info-string languages.
///
/// Capture 1 is the language, capture 2 the block body.
pub(crate) fn fenced_block_pattern(languages: &[&str]) -> String {
    let alternatives: Vec<String> = languages.iter().map(|l| regex::escape(l)).collect();
    format!(
        r"(?ms)^```({})[ \t]*\r?\n(.*?)\r?\n?^```[ \t]*$",
        alternatives.join("|")
    )
}
