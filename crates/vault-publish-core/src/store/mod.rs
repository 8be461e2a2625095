//! Persistent storage abstraction for the compiled-file cache.
//!
//! The [`CacheStore`] trait is a plain keyed record store; the consistency
//! rules (schema versioning, read-modify-write of the local and remote
//! sides) live in [`CompiledFileCache`](crate::cache::CompiledFileCache)
//! so every backend gets them for free.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::hash::text_hash;
use crate::models::CompiledDocument;

/// Cached state of one vault note.
///
/// A hash is only ever set together with the payload it was computed
/// from, through [`set_local`](CacheEntry::set_local) and
/// [`set_remote`](CacheEntry::set_remote).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: String,
    pub schema_version: u32,
    /// When the local payload was last written, in ms since the Unix epoch.
    pub last_write_ms: i64,
    pub local_hash: Option<String>,
    pub local_payload: Option<CompiledDocument>,
    pub remote_hash: Option<String>,
    pub remote_payload: Option<String>,
}

impl CacheEntry {
    /// An empty entry for `path` at the given schema version.
    pub fn new(path: &str, schema_version: u32) -> Self {
        Self {
            path: path.to_string(),
            schema_version,
            last_write_ms: 0,
            local_hash: None,
            local_payload: None,
            remote_hash: None,
            remote_payload: None,
        }
    }

    /// Replace the local side, leaving the remote side untouched.
    pub fn set_local(&mut self, compiled: CompiledDocument, write_ms: i64) {
        self.local_hash = Some(text_hash(&compiled.text));
        self.local_payload = Some(compiled);
        self.last_write_ms = write_ms;
    }

    /// Replace the remote side, leaving the local side untouched.
    pub fn set_remote(&mut self, text: String) {
        self.remote_hash = Some(text_hash(&text));
        self.remote_payload = Some(text);
    }

    /// Local hash, recomputed from the payload if only the payload survived.
    pub fn effective_local_hash(&self) -> Option<String> {
        let payload = self.local_payload.as_ref()?;
        Some(
            self.local_hash
                .clone()
                .unwrap_or_else(|| text_hash(&payload.text)),
        )
    }

    /// Remote hash, recomputed from the payload if only the payload survived.
    pub fn effective_remote_hash(&self) -> Option<String> {
        let payload = self.remote_payload.as_ref()?;
        Some(
            self.remote_hash
                .clone()
                .unwrap_or_else(|| text_hash(payload)),
        )
    }
}

/// Abstract record store behind the compiled-file cache.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](CacheStore::get) | Load the entry for one path |
/// | [`put`](CacheStore::put) | Insert or replace an entry |
/// | [`delete`](CacheStore::delete) | Remove entries by path |
/// | [`paths`](CacheStore::paths) | List every cached path |
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<CacheEntry>>;

    async fn put(&self, entry: &CacheEntry) -> Result<()>;

    async fn delete(&self, paths: &[String]) -> Result<()>;

    async fn paths(&self) -> Result<Vec<String>>;
}
