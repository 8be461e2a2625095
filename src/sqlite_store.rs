//! SQLite-backed [`CacheStore`] implementation.
//!
//! One table, `compiled_files`, holds the cache entries of every vault that
//! shares the database file. Rows are keyed by `(vault_id, path)`, where the
//! vault id is a short digest of the vault's canonical root directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use vault_publish_core::models::CompiledDocument;
use vault_publish_core::store::{CacheEntry, CacheStore};

/// SQLite implementation of the [`CacheStore`] trait.
pub struct SqliteCacheStore {
    pool: SqlitePool,
    vault_id: String,
}

impl SqliteCacheStore {
    pub fn new(pool: SqlitePool, vault_id: impl Into<String>) -> Self {
        Self {
            pool,
            vault_id: vault_id.into(),
        }
    }

    #[allow(dead_code)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn vault_id(&self) -> &str {
        &self.vault_id
    }
}

/// Stable identifier for the vault rooted at `root`.
pub fn vault_id_for(root: &Path) -> Result<String> {
    let canonical = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve vault root {}", root.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    Ok(hex::encode(&hasher.finalize()[..8]))
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, path: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            r#"
            SELECT schema_version, last_write_ms, local_hash, local_payload,
                   remote_hash, remote_payload
            FROM compiled_files
            WHERE vault_id = ? AND path = ?
            "#,
        )
        .bind(&self.vault_id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let local_payload: Option<String> = row.get("local_payload");
        let local_payload = match local_payload {
            Some(json) => match serde_json::from_str::<CompiledDocument>(&json) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!(path, error = %e, "discarding unreadable cached payload");
                    None
                }
            },
            None => None,
        };

        let schema_version: i64 = row.get("schema_version");
        Ok(Some(CacheEntry {
            path: path.to_string(),
            schema_version: u32::try_from(schema_version).unwrap_or(0),
            last_write_ms: row.get("last_write_ms"),
            local_hash: row.get("local_hash"),
            local_payload,
            remote_hash: row.get("remote_hash"),
            remote_payload: row.get("remote_payload"),
        }))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let local_payload = entry
            .local_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO compiled_files (vault_id, path, schema_version, last_write_ms,
                                        local_hash, local_payload, remote_hash, remote_payload)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(vault_id, path) DO UPDATE SET
                schema_version = excluded.schema_version,
                last_write_ms = excluded.last_write_ms,
                local_hash = excluded.local_hash,
                local_payload = excluded.local_payload,
                remote_hash = excluded.remote_hash,
                remote_payload = excluded.remote_payload
            "#,
        )
        .bind(&self.vault_id)
        .bind(&entry.path)
        .bind(i64::from(entry.schema_version))
        .bind(entry.last_write_ms)
        .bind(&entry.local_hash)
        .bind(&local_payload)
        .bind(&entry.remote_hash)
        .bind(&entry.remote_payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, paths: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for path in paths {
            sqlx::query("DELETE FROM compiled_files WHERE vault_id = ? AND path = ?")
                .bind(&self.vault_id)
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn paths(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT path FROM compiled_files WHERE vault_id = ? ORDER BY path")
            .bind(&self.vault_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("path")).collect())
    }
}
