//! Publish status: which notes are new, unchanged, changed or gone.
//!
//! Every note marked for publishing is compiled (through the cache) and
//! its blob hash compared with the remote tree at the note's remote path:
//!
//! | Remote hash | Classification |
//! |-------------|----------------|
//! | absent | unpublished |
//! | equal to local | unchanged |
//! | different | changed (remote hash kept) |
//!
//! Remote `.md` files under the notes root with no marked local note are
//! deleted notes; files under the asset folder that no compiled note
//! references are deleted assets. Computing the status refreshes cached
//! remote payloads whose hash moved, but never writes to the remote.

use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use serde::Serialize;

use crate::cache::CompiledFileCache;
use crate::compiler::NoteCompiler;
use crate::models::CompiledDocument;
use crate::remote::{EntryKind, RemoteTransport, RemoteTreeEntry};
use crate::settings::PublishSettings;
use crate::vault::{is_markdown, Vault};

/// Blob hashes of the remote tree, by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    files: BTreeMap<String, String>,
}

impl RemoteSnapshot {
    /// Keep the blob entries of a recursive tree listing.
    pub fn from_tree(entries: Vec<RemoteTreeEntry>) -> Self {
        Self {
            files: entries
                .into_iter()
                .filter(|e| e.kind == EntryKind::Blob)
                .map(|e| (e.path, e.hash))
                .collect(),
        }
    }

    pub fn from_hashes<I, K, V>(hashes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            files: hashes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn hash(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files below `dir` (every file when `dir` is empty), in path order.
    fn under<'a>(&'a self, dir: &str) -> impl Iterator<Item = (&'a String, &'a String)> + 'a {
        let prefix = match dir.trim_matches('/') {
            "" => String::new(),
            d => format!("{}/", d),
        };
        self.files
            .iter()
            .filter(move |(path, _)| path.starts_with(&prefix))
    }
}

/// One marked note with its compiled output.
#[derive(Debug, Clone, Serialize)]
pub struct NoteStatus {
    /// Vault path.
    pub path: String,
    pub remote_path: String,
    #[serde(skip)]
    pub compiled: CompiledDocument,
    pub local_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_hash: Option<String>,
}

/// A remote file with no local counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedFile {
    pub remote_path: String,
    pub remote_hash: String,
}

/// A marked note that could not be compiled.
#[derive(Debug, Clone, Serialize)]
pub struct FailedNote {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishStatus {
    pub unpublished: Vec<NoteStatus>,
    pub unchanged: Vec<NoteStatus>,
    pub changed: Vec<NoteStatus>,
    pub deleted_notes: Vec<DeletedFile>,
    pub deleted_assets: Vec<DeletedFile>,
    pub failed: Vec<FailedNote>,
}

impl PublishStatus {
    /// Notes whose compiled text must be uploaded.
    pub fn to_publish(&self) -> impl Iterator<Item = &NoteStatus> {
        self.unpublished.iter().chain(self.changed.iter())
    }

    /// Remote paths to delete, notes first.
    pub fn deleted_paths(&self) -> Vec<String> {
        self.deleted_notes
            .iter()
            .chain(self.deleted_assets.iter())
            .map(|d| d.remote_path.clone())
            .collect()
    }

    pub fn is_up_to_date(&self) -> bool {
        self.unpublished.is_empty()
            && self.changed.is_empty()
            && self.deleted_notes.is_empty()
            && self.deleted_assets.is_empty()
    }
}

/// Vault paths of every in-scope note marked for publishing, sorted.
pub async fn marked_for_publish(vault: &dyn Vault, settings: &PublishSettings) -> Result<Vec<String>> {
    let mut marked = Vec::new();
    for path in vault.list_documents() {
        if !is_markdown(&path) || !settings.in_scope(&path) {
            continue;
        }
        let metadata = vault.metadata(&path).await?;
        if settings.is_marked(&metadata.frontmatter) {
            marked.push(path);
        }
    }
    marked.sort();
    Ok(marked)
}

pub struct StatusDiffer<'a> {
    compiler: &'a NoteCompiler,
    cache: &'a CompiledFileCache,
    remote: &'a dyn RemoteTransport,
}

impl<'a> StatusDiffer<'a> {
    pub fn new(
        compiler: &'a NoteCompiler,
        cache: &'a CompiledFileCache,
        remote: &'a dyn RemoteTransport,
    ) -> Self {
        Self {
            compiler,
            cache,
            remote,
        }
    }

    /// Classify every marked note against `snapshot`.
    pub async fn status(&self, snapshot: &RemoteSnapshot) -> Result<PublishStatus> {
        let settings = self.compiler.settings();
        let marked = marked_for_publish(self.compiler.vault(), settings).await?;

        let mut status = PublishStatus::default();
        let mut local_notes: HashSet<String> = HashSet::new();
        let mut local_assets: HashSet<String> = HashSet::new();

        for path in marked {
            let remote_path = settings.remote_note_path(&path);
            local_notes.insert(remote_path.clone());

            let cached = match self.compiler.compile_cached(&path, self.cache).await {
                Ok(cached) => cached,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "cannot compile note");
                    status.failed.push(FailedNote {
                        path,
                        error: format!("{:#}", e),
                    });
                    continue;
                }
            };

            let remote_hash = snapshot.hash(&remote_path).map(str::to_string);
            if let Some(hash) = &remote_hash {
                self.refresh_remote(&path, &remote_path, hash).await;
            }

            let mut compiled = cached.compiled;
            for asset in &mut compiled.assets {
                let asset_path = settings.remote_asset_path(&asset.output_path);
                asset.remote_hash = snapshot.hash(&asset_path).map(str::to_string);
                local_assets.insert(asset_path);
            }

            let note = NoteStatus {
                path,
                remote_path,
                compiled,
                local_hash: cached.hash,
                remote_hash,
            };
            match note.remote_hash.as_deref() {
                None => status.unpublished.push(note),
                Some(hash) if hash == note.local_hash => status.unchanged.push(note),
                Some(_) => status.changed.push(note),
            }
        }

        status.deleted_notes = snapshot
            .under(&settings.notes_root)
            .filter(|(path, _)| is_markdown(path) && !local_notes.contains(*path))
            .map(|(path, hash)| DeletedFile {
                remote_path: path.clone(),
                remote_hash: hash.clone(),
            })
            .collect();

        // A failed note's assets are unknown, so none can be proven unused.
        if status.failed.is_empty() {
            status.deleted_assets = snapshot
                .under(&settings.remote_asset_dir())
                .filter(|(path, _)| !local_assets.contains(*path))
                .map(|(path, hash)| DeletedFile {
                    remote_path: path.clone(),
                    remote_hash: hash.clone(),
                })
                .collect();
        } else {
            tracing::warn!(failed = status.failed.len(), "skipping asset deletion after compile failures");
        }

        for list in [&mut status.unpublished, &mut status.unchanged, &mut status.changed] {
            list.sort_by(|a, b| a.path.cmp(&b.path));
        }
        Ok(status)
    }

    /// Cache the published content of `path` when its remote hash moved.
    async fn refresh_remote(&self, path: &str, remote_path: &str, hash: &str) {
        match self.cache.remote_hash(path).await {
            Ok(Some(cached)) if cached == hash => return,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path, error = %e, "cannot read cache entry");
                return;
            }
        }
        match self.remote.get_file(remote_path).await {
            Ok(Some(file)) => {
                if let Err(e) = self.cache.store_remote(path, file.text).await {
                    tracing::warn!(path, error = %e, "cannot cache remote content");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(path, remote_path, error = %e, "cannot fetch remote file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::text_hash;
    use crate::integration::{IntegrationRegistry, RendererSet};
    use crate::remote::memory::InMemoryRemote;
    use crate::store::memory::InMemoryCacheStore;
    use crate::vault::memory::InMemoryVault;
    use std::sync::Arc;

    struct Fixture {
        compiler: NoteCompiler,
        cache: CompiledFileCache,
        remote: InMemoryRemote,
    }

    impl Fixture {
        fn new(vault: InMemoryVault) -> Self {
            Self {
                compiler: NoteCompiler::new(
                    Arc::new(vault),
                    Arc::new(IntegrationRegistry::with_builtins(RendererSet::default())),
                    Arc::new(PublishSettings::default()),
                ),
                cache: CompiledFileCache::new(Arc::new(InMemoryCacheStore::new())),
                remote: InMemoryRemote::new(),
            }
        }

        async fn status(&self, snapshot: &RemoteSnapshot) -> PublishStatus {
            StatusDiffer::new(&self.compiler, &self.cache, &self.remote)
                .status(snapshot)
                .await
                .unwrap()
        }

        async fn compiled_hash(&self, path: &str) -> String {
            self.compiler
                .compile_cached(path, &self.cache)
                .await
                .unwrap()
                .hash
        }
    }

    const PUBLISHED: &str = "---\npublish: true\n---\nhello";

    #[tokio::test]
    async fn unchanged_changed_and_unpublished() {
        let fx = Fixture::new(
            InMemoryVault::new()
                .with_note("a.md", PUBLISHED)
                .with_note("b.md", PUBLISHED)
                .with_note("c.md", PUBLISHED)
                .with_note("draft.md", "no frontmatter"),
        );
        let h = fx.compiled_hash("a.md").await;
        let snapshot = RemoteSnapshot::from_hashes([
            ("content/a.md", h.as_str()),
            ("content/b.md", "0000000000000000000000000000000000000000"),
        ]);
        let status = fx.status(&snapshot).await;

        let names = |l: &[NoteStatus]| l.iter().map(|n| n.path.clone()).collect::<Vec<_>>();
        assert_eq!(names(&status.unchanged), vec!["a.md"]);
        assert_eq!(names(&status.changed), vec!["b.md"]);
        assert_eq!(
            status.changed[0].remote_hash.as_deref(),
            Some("0000000000000000000000000000000000000000")
        );
        assert_eq!(names(&status.unpublished), vec!["c.md"]);
        assert!(status.deleted_notes.is_empty());
    }

    #[tokio::test]
    async fn deleted_notes_and_assets() {
        let fx = Fixture::new(
            InMemoryVault::new()
                .with_note("a.md", "---\npublish: true\n---\n![[p.png]]")
                .with_file("p.png", &[1]),
        );
        let snapshot = RemoteSnapshot::from_hashes([
            ("content/gone.md", "h1"),
            ("content/img/user/p.png", "h2"),
            ("content/img/user/old.png", "h3"),
            ("content/script.js", "h4"),
            ("README.md", "h5"),
        ]);
        let status = fx.status(&snapshot).await;
        assert_eq!(
            status.deleted_notes,
            vec![DeletedFile {
                remote_path: "content/gone.md".into(),
                remote_hash: "h1".into()
            }]
        );
        assert_eq!(
            status.deleted_assets,
            vec![DeletedFile {
                remote_path: "content/img/user/old.png".into(),
                remote_hash: "h3".into()
            }]
        );
        let asset = &status.unpublished[0].compiled.assets[0];
        assert_eq!(asset.remote_hash.as_deref(), Some("h2"));
    }

    #[tokio::test]
    async fn every_marked_note_lands_in_exactly_one_list() {
        let mut vault = InMemoryVault::new();
        for i in 0..6 {
            vault = vault.with_note(&format!("n{}.md", i), &format!("---\npublish: true\n---\n{}", i));
        }
        let fx = Fixture::new(vault);
        let h0 = fx.compiled_hash("n0.md").await;
        let h1 = fx.compiled_hash("n1.md").await;
        let snapshot = RemoteSnapshot::from_hashes([
            ("content/n0.md".to_string(), h0),
            ("content/n1.md".to_string(), "x".to_string()),
            ("content/n3.md".to_string(), h1),
            ("content/extra.md".to_string(), "y".to_string()),
        ]);
        let status = fx.status(&snapshot).await;
        let mut all: Vec<String> = status
            .unpublished
            .iter()
            .chain(&status.unchanged)
            .chain(&status.changed)
            .map(|n| n.path.clone())
            .collect();
        all.sort();
        assert_eq!(all, (0..6).map(|i| format!("n{}.md", i)).collect::<Vec<_>>());
        assert_eq!(status.unchanged.len(), 1);
        assert_eq!(status.changed.len(), 2);
        assert_eq!(status.deleted_paths(), vec!["content/extra.md"]);
    }

    #[tokio::test]
    async fn changed_remote_content_is_cached() {
        let fx = Fixture::new(InMemoryVault::new().with_note("a.md", PUBLISHED));
        let remote_text = "old published text";
        let remote = InMemoryRemote::new().with_file("content/a.md", remote_text.as_bytes());
        let snapshot = RemoteSnapshot::from_tree(remote.get_tree("main").await.unwrap());
        let status = StatusDiffer::new(&fx.compiler, &fx.cache, &remote)
            .status(&snapshot)
            .await
            .unwrap();
        assert_eq!(status.changed.len(), 1);
        assert_eq!(
            fx.cache.remote_payload("a.md").await.unwrap().as_deref(),
            Some(remote_text)
        );
        assert_eq!(
            fx.cache.remote_hash("a.md").await.unwrap(),
            Some(text_hash(remote_text))
        );
    }
}
