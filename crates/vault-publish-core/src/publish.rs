//! Turning a [`PublishStatus`] into remote commits.
//!
//! A publish run is at most two commits: one carrying every new or changed
//! note, the assets whose remote blob differs, and changed integration
//! stylesheets; then one removing deleted notes and assets. A transport
//! failure aborts the run before the cache records anything as published.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cache::CompiledFileCache;
use crate::compiler::NoteCompiler;
use crate::hash::{base64_blob_hash, text_hash};
use crate::models::{PublishFile, RemoteAsset};
use crate::remote::RemoteTransport;
use crate::status::{NoteStatus, PublishStatus, RemoteSnapshot, StatusDiffer};

/// Everything one publish run will write.
#[derive(Debug, Clone, Default)]
pub struct PublishPlan {
    /// Vault paths of the notes being uploaded.
    pub notes: Vec<String>,
    pub files: Vec<PublishFile>,
    pub deletions: Vec<String>,
}

impl PublishPlan {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.deletions.is_empty()
    }

    pub fn asset_count(&self) -> usize {
        self.files.iter().map(|f| f.assets.len()).sum()
    }
}

/// Outcome of [`Publisher::apply`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    pub notes_published: usize,
    pub assets_uploaded: usize,
    pub files_deleted: usize,
    pub commits: usize,
}

pub struct Publisher<'a> {
    compiler: &'a NoteCompiler,
    cache: &'a CompiledFileCache,
    remote: &'a dyn RemoteTransport,
    branch: String,
}

impl<'a> Publisher<'a> {
    pub fn new(
        compiler: &'a NoteCompiler,
        cache: &'a CompiledFileCache,
        remote: &'a dyn RemoteTransport,
        branch: &str,
    ) -> Self {
        Self {
            compiler,
            cache,
            remote,
            branch: branch.to_string(),
        }
    }

    pub async fn snapshot(&self) -> Result<RemoteSnapshot> {
        let tree = self
            .remote
            .get_tree(&self.branch)
            .await
            .with_context(|| format!("failed to list remote tree at {}", self.branch))?;
        Ok(RemoteSnapshot::from_tree(tree))
    }

    pub async fn status(&self, snapshot: &RemoteSnapshot) -> Result<PublishStatus> {
        StatusDiffer::new(self.compiler, self.cache, self.remote)
            .status(snapshot)
            .await
    }

    /// Files to upload and paths to delete for `status`.
    pub fn plan(&self, status: &PublishStatus, snapshot: &RemoteSnapshot) -> Result<PublishPlan> {
        let settings = self.compiler.settings();
        let mut plan = PublishPlan::default();
        let mut queued_assets: HashSet<String> = HashSet::new();

        let mut pending_assets = |note: &NoteStatus| -> Result<Vec<RemoteAsset>> {
            let mut assets = Vec::new();
            for asset in &note.compiled.assets {
                let remote_path = settings.remote_asset_path(&asset.output_path);
                let local_hash = base64_blob_hash(&asset.content_base64)
                    .with_context(|| format!("invalid asset data for {}", asset.output_path))?;
                if asset.remote_hash.as_deref() == Some(local_hash.as_str())
                    || !queued_assets.insert(remote_path.clone())
                {
                    continue;
                }
                assets.push(RemoteAsset {
                    remote_path,
                    content_base64: asset.content_base64.clone(),
                });
            }
            Ok(assets)
        };

        for note in status.to_publish() {
            let assets = pending_assets(note)?;
            plan.notes.push(note.path.clone());
            plan.files.push(PublishFile {
                remote_path: note.remote_path.clone(),
                text: note.compiled.text.clone(),
                assets,
            });
        }
        // Unchanged text can still reference an image that changed.
        for note in &status.unchanged {
            let assets = pending_assets(note)?;
            if !assets.is_empty() {
                plan.files.push(PublishFile {
                    remote_path: note.remote_path.clone(),
                    text: note.compiled.text.clone(),
                    assets,
                });
            }
        }

        for (id, css) in self.compiler.registry().collected_assets(settings) {
            let remote_path = settings.remote_style_path(&id);
            if snapshot.hash(&remote_path) != Some(text_hash(&css).as_str()) {
                plan.files.push(PublishFile {
                    remote_path,
                    text: css,
                    assets: Vec::new(),
                });
            }
        }

        plan.deletions = status.deleted_paths();
        Ok(plan)
    }

    /// Write `plan` to the remote: one update commit, then one delete commit.
    pub async fn apply(&self, plan: &PublishPlan) -> Result<PublishReport> {
        let mut report = PublishReport::default();

        if !plan.files.is_empty() {
            self.remote
                .update_files(&plan.files)
                .await
                .context("failed to upload files")?;
            report.commits += 1;
            report.notes_published = plan.notes.len();
            report.assets_uploaded = plan.asset_count();
            tracing::info!(files = plan.files.len(), "uploaded files");

            let settings = self.compiler.settings();
            for path in &plan.notes {
                let remote_path = settings.remote_note_path(path);
                if let Some(file) = plan.files.iter().find(|f| f.remote_path == remote_path) {
                    self.cache.store_remote(path, file.text.clone()).await?;
                }
            }
        }

        if !plan.deletions.is_empty() {
            self.remote
                .delete_files(&plan.deletions)
                .await
                .context("failed to delete files")?;
            report.commits += 1;
            report.files_deleted = plan.deletions.len();
            tracing::info!(files = plan.deletions.len(), "deleted files");
        }

        Ok(report)
    }

    /// Status, plan and apply in one go.
    pub async fn publish(&self) -> Result<PublishReport> {
        let snapshot = self.snapshot().await?;
        let status = self.status(&snapshot).await?;
        let plan = self.plan(&status, &snapshot)?;
        self.apply(&plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::{IntegrationRegistry, RendererSet};
    use crate::remote::memory::InMemoryRemote;
    use crate::settings::PublishSettings;
    use crate::store::memory::InMemoryCacheStore;
    use crate::vault::memory::InMemoryVault;
    use std::sync::Arc;

    fn compiler(vault: Arc<InMemoryVault>, settings: PublishSettings) -> NoteCompiler {
        NoteCompiler::new(
            vault,
            Arc::new(IntegrationRegistry::with_builtins(RendererSet::default())),
            Arc::new(settings),
        )
    }

    fn cache() -> CompiledFileCache {
        CompiledFileCache::new(Arc::new(InMemoryCacheStore::new()))
    }

    #[tokio::test]
    async fn publish_uploads_then_settles() {
        let vault = Arc::new(
            InMemoryVault::new()
                .with_note("a.md", "---\npublish: true\n---\n![[p.png]]")
                .with_file("p.png", &[7, 7]),
        );
        let c = compiler(vault, PublishSettings::default());
        let cache = cache();
        let remote = InMemoryRemote::new().with_file("content/old.md", b"old");
        let publisher = Publisher::new(&c, &cache, &remote, "main");

        let report = publisher.publish().await.unwrap();
        assert_eq!(report.notes_published, 1);
        assert_eq!(report.assets_uploaded, 1);
        assert_eq!(report.files_deleted, 1);
        assert_eq!(remote.commit_count(), 2);
        assert_eq!(remote.file("content/img/user/p.png"), Some(vec![7, 7]));
        assert!(remote.file("content/old.md").is_none());
        assert!(cache.are_local_and_remote_identical("a.md").await.unwrap());

        let snapshot = publisher.snapshot().await.unwrap();
        let status = publisher.status(&snapshot).await.unwrap();
        assert!(status.is_up_to_date());
        assert!(publisher.plan(&status, &snapshot).unwrap().is_empty());
    }

    #[tokio::test]
    async fn stylesheets_upload_once() {
        let vault = Arc::new(InMemoryVault::new());
        let mut settings = PublishSettings::default();
        settings.integrations.insert("auto_card_link".into(), true);
        let c = compiler(vault, settings);
        let cache = cache();
        let remote = InMemoryRemote::new();
        let publisher = Publisher::new(&c, &cache, &remote, "main");

        publisher.publish().await.unwrap();
        assert!(remote
            .file("quartz/styles/syncer/_auto-card-link.scss")
            .is_some());
        let report = publisher.publish().await.unwrap();
        assert_eq!(report.commits, 0);
    }

    #[tokio::test]
    async fn failed_upload_records_nothing() {
        let vault = Arc::new(InMemoryVault::new().with_note("a.md", "---\npublish: true\n---\nx"));
        let c = compiler(vault, PublishSettings::default());
        let cache = cache();
        let remote = InMemoryRemote::new();
        remote.fail_next_write();
        let publisher = Publisher::new(&c, &cache, &remote, "main");

        assert!(publisher.publish().await.is_err());
        assert!(remote.paths().is_empty());
        assert_eq!(cache.remote_hash("a.md").await.unwrap(), None);
    }
}
