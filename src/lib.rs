//! # vault-publish
//!
//! Compiles the publish-marked notes of a Markdown knowledge vault into a
//! static-site corpus and keeps a Git-hosted repository in sync with it.
//!
//! The compile pipeline, integrations, cache rules and status differ live
//! in `vault-publish-core`; this crate plugs real I/O into its traits.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ Filesystem   │──▶│  NoteCompiler    │──▶│  Publisher   │──▶ GitHub
//! │ vault        │   │  + integrations  │   │  (2 commits) │    Git Data API
//! └──────────────┘   └────────┬─────────┘   └──────────────┘
//!                             │                    ▲
//!                  renderer   ▼                    │
//!                  processes  SQLite compiled-file cache
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite cache store |
//! | [`vault_fs`] | Filesystem vault |
//! | [`remote_github`] | GitHub transport |
//! | [`renderer_cmd`] | External renderer processes |
//! | [`progress`] | Progress reporting on stderr |
//! | [`publish`] | CLI command implementations |

pub mod config;
pub mod db;
pub mod migrate;
pub mod progress;
pub mod publish;
pub mod remote_github;
pub mod renderer_cmd;
pub mod sqlite_store;
pub mod vault_fs;
