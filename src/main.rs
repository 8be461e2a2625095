//! # vault-publish CLI (`vpub`)
//!
//! Compiles the notes of a Markdown vault that are marked for publishing
//! and syncs them, with their images and integration stylesheets, to a
//! GitHub repository backing a static site.
//!
//! ## Usage
//!
//! ```bash
//! vpub --config ./config/vpub.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vpub init` | Create the SQLite cache schema |
//! | `vpub status` | Show unpublished, changed, unchanged and deleted notes |
//! | `vpub publish` | Upload new and changed notes, then delete stale files |
//! | `vpub compile <path>` | Print the compiled form of one note |
//! | `vpub cache gc` | Drop cache entries of notes that no longer exist |
//!
//! ## Examples
//!
//! ```bash
//! # What would change?
//! vpub status --config ./config/vpub.toml
//!
//! # Publish, printing machine-readable progress on stderr
//! vpub publish --progress json
//!
//! # Inspect the compiler output for one note
//! vpub compile "Notes/Reading list.md" --assets
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vault_publish::progress::ProgressMode;
use vault_publish::{config, migrate, publish};

/// vault-publish: compile a Markdown vault and sync it to a Git-hosted site.
#[derive(Parser)]
#[command(
    name = "vpub",
    about = "Compile a Markdown vault into a static-site corpus and sync it to GitHub",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vpub.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Progress output on stderr. Defaults to human output on a TTY.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the cache database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Compare the vault with the remote repository.
    Status {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Publish new and changed notes and remove deleted ones.
    ///
    /// Writes at most two commits: one with every upload, one with every
    /// deletion.
    Publish {
        /// Show what would be written without touching the remote.
        #[arg(long)]
        dry_run: bool,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the compiled form of one note.
    Compile {
        /// Vault-relative path of the note.
        path: String,

        /// List extracted assets on stderr.
        #[arg(long)]
        assets: bool,
    },

    /// Manage the compiled-file cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove entries of notes that no longer exist in the vault.
    Gc,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;
    let reporter = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Cache database initialized successfully.");
        }
        Commands::Status { json } => {
            publish::run_status(&cfg, json, reporter.as_ref()).await?;
        }
        Commands::Publish { dry_run, json } => {
            publish::run_publish(&cfg, dry_run, json, reporter.as_ref()).await?;
        }
        Commands::Compile { path, assets } => {
            publish::run_compile(&cfg, &path, assets).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Gc => {
                publish::run_cache_gc(&cfg).await?;
            }
        },
    }

    Ok(())
}
