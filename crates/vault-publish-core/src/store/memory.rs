//! In-memory [`CacheStore`] implementation for testing.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Nothing survives the
//! process.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::{CacheEntry, CacheStore};

pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, path: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().unwrap().get(path).cloned())
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .insert(entry.path.clone(), entry.clone());
        Ok(())
    }

    async fn delete(&self, paths: &[String]) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        for path in paths {
            entries.remove(path);
        }
        Ok(())
    }

    async fn paths(&self) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self.entries.read().unwrap().keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}
