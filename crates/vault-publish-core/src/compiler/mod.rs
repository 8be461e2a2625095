//! Note compilation pipeline.
//!
//! Turns one vault note into the text published to the site, plus the
//! binary assets it references. The stage order is fixed:
//!
//! ```text
//! source note
//!   │ 1. frontmatter      → single-line JSON block
//!   │ 2. transclusion     → ![[note]] / #heading / #^block inlined (depth ≤ 4)
//!   │ 3. integrations     → whole-file transforms, then pattern matches
//!   │ 4. full-path links  → [[name]] → [[folder/name]]
//!   │ 5. comments         → %% … %% removed
//!   │ 6. svg              → ![[x.svg]] inlined as markup
//!   │ 7. target="_blank"  → stripped
//!   │ 8. vault scoping    → [[sub/x]] → [[x]]
//!   ▼ 9. assets           → images extracted to /img/user/…
//! CompiledDocument { text, assets }
//! ```
//!
//! Transclusion runs before link rewriting so links brought in by inlined
//! notes are rewritten too; asset extraction runs last so it sees fully
//! resolved link text.

pub mod assets;
pub mod comments;
pub mod links;
pub mod patterns;
pub mod transclusion;

use std::sync::Arc;

use anyhow::Result;

use crate::cache::{CachedCompile, CompiledFileCache};
use crate::frontmatter::compile_frontmatter;
use crate::integration::{IntegrationContext, IntegrationRegistry};
use crate::markdown::strip_frontmatter;
use crate::models::CompiledDocument;
use crate::settings::PublishSettings;
use crate::vault::Vault;

pub struct NoteCompiler {
    vault: Arc<dyn Vault>,
    registry: Arc<IntegrationRegistry>,
    settings: Arc<PublishSettings>,
}

impl NoteCompiler {
    pub fn new(
        vault: Arc<dyn Vault>,
        registry: Arc<IntegrationRegistry>,
        settings: Arc<PublishSettings>,
    ) -> Self {
        Self {
            vault,
            registry,
            settings,
        }
    }

    pub fn vault(&self) -> &dyn Vault {
        self.vault.as_ref()
    }

    pub fn registry(&self) -> &IntegrationRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    /// Compile `path` from scratch.
    ///
    /// Fails only when the note itself cannot be read; problems with
    /// embeds, links and integrations are logged and leave the affected
    /// markup untouched.
    pub async fn compile(&self, path: &str) -> Result<CompiledDocument> {
        let vault = self.vault.as_ref();
        let settings = self.settings.as_ref();
        let doc = vault.read_document(path).await?;

        let mut text = compile_frontmatter(&doc.metadata, settings);
        text.push_str(strip_frontmatter(&doc.text));

        let text = transclusion::expand(vault, settings, text, path.to_string(), 0).await?;

        let ctx = IntegrationContext {
            path,
            vault,
            settings,
        };
        let text = patterns::apply_integrations(&doc, text, &self.registry, &ctx).await;

        let text = links::rewrite_full_paths(&text, path, vault);
        let text = comments::strip_comments(&text);
        let text = assets::inline_svgs(&text, path, vault).await?;
        let text = links::strip_target_blank(&text);
        let text = links::scope_vault_links(&text, settings);
        let (text, assets) = assets::extract_assets(&text, path, vault).await?;

        tracing::debug!(path, assets = assets.len(), "compiled note");
        Ok(CompiledDocument::new(text, assets))
    }

    /// Compile `path`, reusing the cached output while the note is unchanged.
    pub async fn compile_cached(&self, path: &str, cache: &CompiledFileCache) -> Result<CachedCompile> {
        let metadata = self.vault.metadata(path).await?;
        if !cache.is_local_outdated(path, metadata.modified_ms).await? {
            if let Some(cached) = cache.load_local(path).await? {
                tracing::trace!(path, "compile cache hit");
                return Ok(cached);
            }
        }
        let compiled = self.compile(path).await?;
        cache
            .store_local(path, compiled, chrono::Utc::now().timestamp_millis())
            .await
    }
}
