//! Filesystem vault.
//!
//! Walks the configured vault root once, keeping an index of every file as
//! a forward-slash, vault-relative path. Notes are read from disk on
//! demand and indexed with the core Markdown scanner, so metadata matches
//! what the in-memory vault reports for the same text.
//!
//! Default excludes (always applied, in addition to `vault.exclude_globs`):
//! `**/.git/**`, `**/.obsidian/**`, `**/.trash/**`, `**/node_modules/**`.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use vault_publish_core::markdown::index_document;
use vault_publish_core::models::DocumentMetadata;
use vault_publish_core::vault::{is_markdown, resolve, BinaryStore, DocumentStore};

use crate::config::VaultConfig;

const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/.obsidian/**",
    "**/.trash/**",
    "**/node_modules/**",
];

pub struct FilesystemVault {
    root: PathBuf,
    paths: BTreeSet<String>,
}

impl FilesystemVault {
    /// Scan the vault described by `config`.
    pub fn open(config: &VaultConfig) -> Result<Self> {
        let root = &config.root;
        if !root.is_dir() {
            bail!("Vault root does not exist: {}", root.display());
        }

        let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        excludes.extend(config.exclude_globs.iter().cloned());
        let exclude_set = build_globset(&excludes)?;

        let mut paths = BTreeSet::new();
        let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().replace('\\', "/");
            if exclude_set.is_match(&rel_str) {
                continue;
            }
            paths.insert(rel_str);
        }

        tracing::debug!(root = %root.display(), files = paths.len(), "scanned vault");
        Ok(Self {
            root: root.clone(),
            paths,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every indexed file, notes and attachments alike.
    pub fn paths(&self) -> &BTreeSet<String> {
        &self.paths
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        if !self.paths.contains(path) {
            return Err(anyhow!("no such file in vault: {}", path));
        }
        Ok(self.root.join(path))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn to_ms(time: std::io::Result<SystemTime>) -> Option<i64> {
    let time = time.ok()?;
    let since = time.duration_since(SystemTime::UNIX_EPOCH).ok()?;
    i64::try_from(since.as_millis()).ok()
}

#[async_trait]
impl DocumentStore for FilesystemVault {
    async fn read_text(&self, path: &str) -> Result<String> {
        let full = self.full_path(path)?;
        let bytes = tokio::fs::read(&full)
            .await
            .with_context(|| format!("Failed to read {}", full.display()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn metadata(&self, path: &str) -> Result<DocumentMetadata> {
        let full = self.full_path(path)?;
        let stat = tokio::fs::metadata(&full)
            .await
            .with_context(|| format!("Failed to stat {}", full.display()))?;
        let modified_ms = to_ms(stat.modified()).unwrap_or(0);
        let created_ms = to_ms(stat.created()).unwrap_or(modified_ms);
        let text = self.read_text(path).await?;
        Ok(index_document(&text, created_ms, modified_ms))
    }

    fn resolve_link(&self, raw_ref: &str, from_path: &str) -> Option<String> {
        resolve::resolve_link(&self.paths, raw_ref, from_path)
    }

    fn list_documents(&self) -> Vec<String> {
        self.paths.iter().filter(|p| is_markdown(p)).cloned().collect()
    }
}

#[async_trait]
impl BinaryStore for FilesystemVault {
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.full_path(path)?;
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("Failed to read {}", full.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn vault_config(root: &Path, exclude_globs: Vec<String>) -> VaultConfig {
        VaultConfig {
            root: root.to_path_buf(),
            exclude_globs,
            follow_symlinks: false,
        }
    }

    fn sample_vault() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("notes/deep")).unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::write(root.join("index.md"), "---\npublish: true\n---\n# Home\n").unwrap();
        fs::write(root.join("notes/deep/topic.md"), "Topic ^t1\n").unwrap();
        fs::write(root.join("notes/pic.png"), [1u8, 2, 3]).unwrap();
        fs::write(root.join(".obsidian/app.json"), "{}").unwrap();
        fs::write(root.join("drafts/wip.md"), "wip").unwrap();
        tmp
    }

    #[test]
    fn scan_applies_excludes() {
        let tmp = sample_vault();
        let vault =
            FilesystemVault::open(&vault_config(tmp.path(), vec!["drafts/**".into()])).unwrap();
        let paths: Vec<&str> = vault.paths().iter().map(|s| s.as_str()).collect();
        assert_eq!(paths, vec!["index.md", "notes/deep/topic.md", "notes/pic.png"]);
        assert_eq!(
            vault.list_documents(),
            vec!["index.md".to_string(), "notes/deep/topic.md".to_string()]
        );
    }

    #[test]
    fn missing_root_fails() {
        let tmp = TempDir::new().unwrap();
        let err = FilesystemVault::open(&vault_config(&tmp.path().join("nope"), vec![]));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn reads_notes_metadata_and_bytes() {
        let tmp = sample_vault();
        let vault = FilesystemVault::open(&vault_config(tmp.path(), vec![])).unwrap();

        let meta = vault.metadata("index.md").await.unwrap();
        assert_eq!(meta.frontmatter.get("publish"), Some(&serde_json::json!(true)));
        assert_eq!(meta.headings[0].text, "Home");
        assert!(meta.modified_ms > 0);

        let topic = vault.metadata("notes/deep/topic.md").await.unwrap();
        assert!(topic.blocks.contains_key("t1"));

        assert_eq!(vault.read_bytes("notes/pic.png").await.unwrap(), vec![1, 2, 3]);
        assert!(vault.read_text(".obsidian/app.json").await.is_err());
    }

    #[test]
    fn resolves_by_suffix_and_relative_path() {
        let tmp = sample_vault();
        let vault = FilesystemVault::open(&vault_config(tmp.path(), vec![])).unwrap();
        assert_eq!(
            vault.resolve_link("topic", "index.md").as_deref(),
            Some("notes/deep/topic.md")
        );
        assert_eq!(
            vault.resolve_link("../pic.png", "notes/deep/topic.md").as_deref(),
            Some("notes/pic.png")
        );
        assert_eq!(vault.resolve_link("missing", "index.md"), None);
    }
}
