//! Compiled-file cache with Git-compatible content hashes.
//!
//! Each vault note has one [`CacheEntry`] holding two independently
//! updated sides:
//!
//! - **local**: the last compiled output and its blob hash, stamped with
//!   the time it was written;
//! - **remote**: the last known content of the published file and its
//!   blob hash.
//!
//! Every write is read-modify-write: storing a new local payload keeps the
//! remote side, and vice versa. An entry whose schema version differs from
//! the cache's is treated as absent, which forces a full recompute.
//!
//! ```text
//! Absent ──compile──▶ LocalOnly ──remote sync──▶ Identical | Diverged
//!    ▲                    ▲                            │
//!    │                    └────────content change──────┘
//!    └──────────── synchronize (path vanished) ─────────
//! ```

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use anyhow::Result;

use crate::models::CompiledDocument;
use crate::store::{CacheEntry, CacheStore};

/// Version of the cached payload format. Bump whenever compiler output
/// for unchanged input may differ, so stale entries recompile.
pub const CACHE_SCHEMA_VERSION: u32 = 3;

/// Cached compile output with its blob hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCompile {
    pub compiled: CompiledDocument,
    pub hash: String,
}

pub struct CompiledFileCache {
    store: Arc<dyn CacheStore>,
    schema_version: u32,
}

impl CompiledFileCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_schema_version(store, CACHE_SCHEMA_VERSION)
    }

    pub fn with_schema_version(store: Arc<dyn CacheStore>, schema_version: u32) -> Self {
        Self {
            store,
            schema_version,
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Current entry for `path`, ignoring entries from another schema version.
    pub async fn entry(&self, path: &str) -> Result<Option<CacheEntry>> {
        Ok(self
            .store
            .get(path)
            .await?
            .filter(|e| e.schema_version == self.schema_version))
    }

    async fn entry_or_new(&self, path: &str) -> Result<CacheEntry> {
        Ok(self
            .entry(path)
            .await?
            .unwrap_or_else(|| CacheEntry::new(path, self.schema_version)))
    }

    /// Whether `path` must be recompiled given its modification time.
    ///
    /// True when nothing is cached, the schema version changed, or the
    /// note was modified after the cached payload was written.
    pub async fn is_local_outdated(&self, path: &str, modified_ms: i64) -> Result<bool> {
        let Some(entry) = self.entry(path).await? else {
            return Ok(true);
        };
        if entry.local_payload.is_none() {
            return Ok(true);
        }
        Ok(entry.last_write_ms < modified_ms)
    }

    /// Cached local output, if any.
    pub async fn load_local(&self, path: &str) -> Result<Option<CachedCompile>> {
        let Some(entry) = self.entry(path).await? else {
            return Ok(None);
        };
        let hash = entry.effective_local_hash();
        Ok(entry
            .local_payload
            .zip(hash)
            .map(|(compiled, hash)| CachedCompile { compiled, hash }))
    }

    /// Store fresh compile output, keeping any known remote state.
    pub async fn store_local(
        &self,
        path: &str,
        compiled: CompiledDocument,
        write_ms: i64,
    ) -> Result<CachedCompile> {
        let mut entry = self.entry_or_new(path).await?;
        entry.set_local(compiled.clone(), write_ms);
        self.store.put(&entry).await?;
        let hash = entry.effective_local_hash().unwrap_or_default();
        Ok(CachedCompile { compiled, hash })
    }

    /// Store the content currently published for `path`, keeping the local side.
    pub async fn store_remote(&self, path: &str, text: String) -> Result<String> {
        let mut entry = self.entry_or_new(path).await?;
        entry.set_remote(text);
        self.store.put(&entry).await?;
        Ok(entry.effective_remote_hash().unwrap_or_default())
    }

    pub async fn remote_hash(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .entry(path)
            .await?
            .and_then(|e| e.effective_remote_hash()))
    }

    pub async fn remote_payload(&self, path: &str) -> Result<Option<String>> {
        Ok(self.entry(path).await?.and_then(|e| e.remote_payload))
    }

    /// True only when both payloads exist at the current schema version and
    /// their hashes match.
    pub async fn are_local_and_remote_identical(&self, path: &str) -> Result<bool> {
        let Some(entry) = self.entry(path).await? else {
            return Ok(false);
        };
        match (entry.effective_local_hash(), entry.effective_remote_hash()) {
            (Some(local), Some(remote)) => Ok(local == remote),
            _ => Ok(false),
        }
    }

    /// Drop every entry whose path is not in `existing`.
    ///
    /// Returns the removed paths.
    pub async fn synchronize(&self, existing: &HashSet<String>) -> Result<BTreeSet<String>> {
        let removed: BTreeSet<String> = self
            .store
            .paths()
            .await?
            .into_iter()
            .filter(|p| !existing.contains(p))
            .collect();
        if !removed.is_empty() {
            let paths: Vec<String> = removed.iter().cloned().collect();
            self.store.delete(&paths).await?;
            tracing::debug!(removed = removed.len(), "garbage-collected cache entries");
        }
        Ok(removed)
    }
}
