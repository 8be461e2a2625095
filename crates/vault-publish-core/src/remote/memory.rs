//! In-memory [`RemoteTransport`] for tests.
//!
//! Keeps a flat `path → bytes` tree, hashes blobs exactly like Git, and
//! applies each batch atomically as one commit. A failure can be injected
//! to exercise batch-abort handling.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{EntryKind, RemoteFile, RemoteTransport, RemoteTreeEntry};
use crate::hash::git_blob_hash;
use crate::models::PublishFile;

pub struct InMemoryRemote {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
    commits: AtomicUsize,
    fail_next: AtomicBool,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
            commits: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.files
            .write()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        self
    }

    /// Number of commits created so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.read().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.read().unwrap().keys().cloned().collect()
    }

    /// Make the next batch write fail without applying anything.
    pub fn fail_next_write(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            bail!("injected transport failure");
        }
        Ok(())
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteTransport for InMemoryRemote {
    async fn get_tree(&self, _git_ref: &str) -> Result<Vec<RemoteTreeEntry>> {
        let files = self.files.read().unwrap();
        Ok(files
            .iter()
            .map(|(path, bytes)| RemoteTreeEntry {
                path: path.clone(),
                hash: git_blob_hash(bytes),
                kind: EntryKind::Blob,
            })
            .collect())
    }

    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>> {
        let files = self.files.read().unwrap();
        Ok(files.get(path).map(|bytes| RemoteFile {
            text: String::from_utf8_lossy(bytes).into_owned(),
            hash: git_blob_hash(bytes),
        }))
    }

    async fn update_files(&self, files: &[PublishFile]) -> Result<()> {
        self.check_failure()?;
        // Decode everything first so a bad asset aborts the whole batch.
        let mut staged: Vec<(String, Vec<u8>)> = Vec::new();
        for file in files {
            staged.push((file.remote_path.clone(), file.text.as_bytes().to_vec()));
            for asset in &file.assets {
                let bytes = STANDARD
                    .decode(&asset.content_base64)
                    .with_context(|| format!("invalid base64 for {}", asset.remote_path))?;
                staged.push((asset.remote_path.clone(), bytes));
            }
        }
        let mut tree = self.files.write().unwrap();
        for (path, bytes) in staged {
            tree.insert(path, bytes);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_files(&self, paths: &[String]) -> Result<()> {
        self.check_failure()?;
        let mut tree = self.files.write().unwrap();
        for path in paths {
            tree.remove(path);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
