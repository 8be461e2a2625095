//! `vpub status`, `vpub publish`, `vpub compile` and `vpub cache gc`.
//!
//! Every command opens a [`Session`]: the filesystem vault, the SQLite
//! cache keyed by the vault's id, and a compiler wired with the built-in
//! integrations and the configured renderer processes.
//!
//! ```text
//! Session::open ─▶ cache gc ─▶ remote tree ─▶ PublishStatus
//!                                                 │ status: print
//!                                                 ▼ publish
//!                                   plan ─▶ update commit ─▶ delete commit
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;

use vault_publish_core::cache::CompiledFileCache;
use vault_publish_core::compiler::NoteCompiler;
use vault_publish_core::integration::IntegrationRegistry;
use vault_publish_core::publish::{PublishReport, Publisher};
use vault_publish_core::remote::RemoteTransport;
use vault_publish_core::status::PublishStatus;
use vault_publish_core::vault::DocumentStore;

use crate::config::Config;
use crate::db;
use crate::migrate::migrate_pool;
use crate::progress::{PublishProgressEvent, PublishProgressReporter};
use crate::remote_github::GithubTransport;
use crate::renderer_cmd::renderer_set;
use crate::sqlite_store::{vault_id_for, SqliteCacheStore};
use crate::vault_fs::FilesystemVault;

/// Everything a command needs to compile notes of one vault.
pub struct Session {
    pub vault: Arc<FilesystemVault>,
    pub compiler: NoteCompiler,
    pub cache: CompiledFileCache,
    pool: SqlitePool,
}

impl Session {
    pub async fn open(config: &Config) -> Result<Self> {
        let vault = Arc::new(FilesystemVault::open(&config.vault)?);
        let vault_id = vault_id_for(vault.root())?;

        let pool = db::connect(config).await?;
        migrate_pool(&pool).await?;
        let store = SqliteCacheStore::new(pool.clone(), vault_id);
        let cache = CompiledFileCache::new(Arc::new(store));

        let registry = IntegrationRegistry::with_builtins(renderer_set(config)?);
        let compiler = NoteCompiler::new(
            vault.clone(),
            Arc::new(registry),
            Arc::new(config.publish.clone()),
        );

        Ok(Self {
            vault,
            compiler,
            cache,
            pool,
        })
    }

    /// Drop cache entries of notes that no longer exist.
    pub async fn collect_garbage(&self) -> Result<usize> {
        let existing: HashSet<String> = self.vault.list_documents().into_iter().collect();
        let removed = self.cache.synchronize(&existing).await?;
        Ok(removed.len())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Result of a publish run, as printed by `vpub publish`.
#[derive(Debug, Serialize)]
pub struct PublishOutcome {
    pub dry_run: bool,
    pub status: PublishStatus,
    pub report: PublishReport,
    /// Remote paths written (or that would be written).
    pub uploaded: Vec<String>,
    pub deleted: Vec<String>,
}

/// Compute the publish status of `session` against `remote`.
pub async fn status_with(
    session: &Session,
    remote: &dyn RemoteTransport,
    branch: &str,
    reporter: &dyn PublishProgressReporter,
) -> Result<PublishStatus> {
    session.collect_garbage().await?;
    reporter.report(PublishProgressEvent::Scanned {
        files: session.vault.paths().len() as u64,
        notes: session.vault.list_documents().len() as u64,
    });

    let publisher = Publisher::new(&session.compiler, &session.cache, remote, branch);
    let snapshot = publisher.snapshot().await?;
    let marked = vault_publish_core::status::marked_for_publish(
        session.compiler.vault(),
        session.compiler.settings(),
    )
    .await?;
    reporter.report(PublishProgressEvent::Comparing {
        notes: marked.len() as u64,
        remote_files: snapshot.len() as u64,
    });
    publisher.status(&snapshot).await
}

/// Publish `session` to `remote`: one update commit, then one delete commit.
pub async fn publish_with(
    session: &Session,
    remote: &dyn RemoteTransport,
    branch: &str,
    dry_run: bool,
    reporter: &dyn PublishProgressReporter,
) -> Result<PublishOutcome> {
    session.collect_garbage().await?;
    reporter.report(PublishProgressEvent::Scanned {
        files: session.vault.paths().len() as u64,
        notes: session.vault.list_documents().len() as u64,
    });

    let publisher = Publisher::new(&session.compiler, &session.cache, remote, branch);
    let snapshot = publisher.snapshot().await?;
    let status = publisher.status(&snapshot).await?;
    let plan = publisher.plan(&status, &snapshot)?;

    let mut uploaded: Vec<String> = Vec::new();
    for file in &plan.files {
        uploaded.push(file.remote_path.clone());
        uploaded.extend(file.assets.iter().map(|a| a.remote_path.clone()));
    }
    let deleted = plan.deletions.clone();

    let report = if dry_run || plan.is_empty() {
        PublishReport::default()
    } else {
        if !plan.files.is_empty() {
            reporter.report(PublishProgressEvent::Uploading {
                files: plan.files.len() as u64,
                assets: plan.asset_count() as u64,
            });
        }
        if !plan.deletions.is_empty() {
            reporter.report(PublishProgressEvent::Deleting {
                files: plan.deletions.len() as u64,
            });
        }
        publisher.apply(&plan).await?
    };

    Ok(PublishOutcome {
        dry_run,
        status,
        report,
        uploaded,
        deleted,
    })
}

fn print_status(status: &PublishStatus) {
    println!("Unpublished ({}):", status.unpublished.len());
    for note in &status.unpublished {
        println!("  + {} → {}", note.path, note.remote_path);
    }
    println!("Changed ({}):", status.changed.len());
    for note in &status.changed {
        println!("  ~ {} → {}", note.path, note.remote_path);
    }
    println!("Unchanged: {}", status.unchanged.len());
    println!(
        "Deleted ({}):",
        status.deleted_notes.len() + status.deleted_assets.len()
    );
    for file in status.deleted_notes.iter().chain(&status.deleted_assets) {
        println!("  - {}", file.remote_path);
    }
    if !status.failed.is_empty() {
        println!("Failed ({}):", status.failed.len());
        for failure in &status.failed {
            println!("  ! {}: {}", failure.path, failure.error);
        }
    }
}

pub async fn run_status(
    config: &Config,
    json: bool,
    reporter: &dyn PublishProgressReporter,
) -> Result<()> {
    let remote_config = config.remote()?;
    let remote = GithubTransport::from_config(remote_config)?;
    let session = Session::open(config).await?;

    let status = status_with(&session, &remote, &remote_config.branch, reporter).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
        if status.is_up_to_date() {
            println!("\nEverything is published.");
        }
    }

    session.close().await;
    Ok(())
}

pub async fn run_publish(
    config: &Config,
    dry_run: bool,
    json: bool,
    reporter: &dyn PublishProgressReporter,
) -> Result<()> {
    let remote_config = config.remote()?;
    let remote = GithubTransport::from_config(remote_config)?;
    let session = Session::open(config).await?;

    let outcome = publish_with(&session, &remote, &remote_config.branch, dry_run, reporter)
        .await
        .context("publish failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        if dry_run {
            println!("Dry run: nothing was written.");
        }
        for path in &outcome.uploaded {
            println!("  ↑ {}", path);
        }
        for path in &outcome.deleted {
            println!("  ✕ {}", path);
        }
        for failure in &outcome.status.failed {
            println!("  ! {}: {}", failure.path, failure.error);
        }
        if outcome.uploaded.is_empty() && outcome.deleted.is_empty() {
            println!("Everything is published.");
        } else if !dry_run {
            println!(
                "Published {} notes, {} assets; deleted {} files in {} commits.",
                outcome.report.notes_published,
                outcome.report.assets_uploaded,
                outcome.report.files_deleted,
                outcome.report.commits
            );
        }
    }

    session.close().await;
    Ok(())
}

/// Print the compiled form of one note.
pub async fn run_compile(config: &Config, path: &str, show_assets: bool) -> Result<()> {
    let session = Session::open(config).await?;
    let compiled = session
        .compiler
        .compile(path)
        .await
        .with_context(|| format!("failed to compile {}", path))?;

    print!("{}", compiled.text);
    if show_assets {
        eprintln!();
        for asset in &compiled.assets {
            eprintln!(
                "asset {} → {}",
                asset.output_path,
                session.compiler.settings().remote_asset_path(&asset.output_path)
            );
        }
    }

    session.close().await;
    Ok(())
}

pub async fn run_cache_gc(config: &Config) -> Result<()> {
    let session = Session::open(config).await?;
    let removed = session.collect_garbage().await?;
    println!("Removed {} stale cache entries.", removed);
    session.close().await;
    Ok(())
}
