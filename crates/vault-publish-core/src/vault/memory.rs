//! In-memory [`Vault`](super::Vault) implementation for testing and embedding.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{is_markdown, resolve, BinaryStore, DocumentStore};
use crate::markdown::index_document;
use crate::models::DocumentMetadata;

struct StoredFile {
    bytes: Vec<u8>,
    created_ms: i64,
    modified_ms: i64,
}

/// A vault held entirely in memory.
///
/// Notes are indexed with the same Markdown scanner as the filesystem
/// vault, so metadata lookups behave identically.
pub struct InMemoryVault {
    files: RwLock<BTreeMap<String, StoredFile>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Add or replace a note with modification time 0.
    pub fn with_note(self, path: &str, text: &str) -> Self {
        self.put_note(path, text, 0);
        self
    }

    /// Add or replace a binary file.
    pub fn with_file(self, path: &str, bytes: &[u8]) -> Self {
        self.put_file(path, bytes.to_vec(), 0);
        self
    }

    /// Add or replace a note, stamping it with `modified_ms`.
    pub fn put_note(&self, path: &str, text: &str, modified_ms: i64) {
        self.put_file(path, text.as_bytes().to_vec(), modified_ms);
    }

    pub fn put_file(&self, path: &str, bytes: Vec<u8>, modified_ms: i64) {
        let mut files = self.files.write().unwrap();
        let created_ms = files
            .get(path)
            .map(|f| f.created_ms)
            .unwrap_or(modified_ms);
        files.insert(
            path.to_string(),
            StoredFile {
                bytes,
                created_ms,
                modified_ms,
            },
        );
    }

    pub fn remove(&self, path: &str) {
        self.files.write().unwrap().remove(path);
    }

    fn paths(&self) -> BTreeSet<String> {
        self.files.read().unwrap().keys().cloned().collect()
    }
}

impl Default for InMemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryVault {
    async fn read_text(&self, path: &str) -> Result<String> {
        let files = self.files.read().unwrap();
        let file = files
            .get(path)
            .ok_or_else(|| anyhow!("no such note: {}", path))?;
        Ok(String::from_utf8_lossy(&file.bytes).into_owned())
    }

    async fn metadata(&self, path: &str) -> Result<DocumentMetadata> {
        let files = self.files.read().unwrap();
        let file = files
            .get(path)
            .ok_or_else(|| anyhow!("no such note: {}", path))?;
        let text = String::from_utf8_lossy(&file.bytes);
        Ok(index_document(&text, file.created_ms, file.modified_ms))
    }

    fn resolve_link(&self, raw_ref: &str, from_path: &str) -> Option<String> {
        resolve::resolve_link(&self.paths(), raw_ref, from_path)
    }

    fn list_documents(&self) -> Vec<String> {
        self.paths().into_iter().filter(|p| is_markdown(p)).collect()
    }
}

#[async_trait]
impl BinaryStore for InMemoryVault {
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.read().unwrap();
        files
            .get(path)
            .map(|f| f.bytes.clone())
            .ok_or_else(|| anyhow!("no such file: {}", path))
    }
}
