use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the cache schema on an open pool. Safe to run repeatedly.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS compiled_files (
            vault_id TEXT NOT NULL,
            path TEXT NOT NULL,
            schema_version INTEGER NOT NULL,
            last_write_ms INTEGER NOT NULL DEFAULT 0,
            local_hash TEXT,
            local_payload TEXT,
            remote_hash TEXT,
            remote_payload TEXT,
            PRIMARY KEY (vault_id, path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_compiled_files_vault ON compiled_files(vault_id)")
        .execute(pool)
        .await?;

    Ok(())
}
