//! # Vault Publish Core
//!
//! Storage-agnostic logic for vault-publish: the note compilation
//! pipeline, pluggable integrations, the content-hash cache, and the
//! publish-status differ.
//!
//! Everything that touches the outside world sits behind a trait:
//!
//! | Concern | Trait | In-memory implementation |
//! |---------|-------|--------------------------|
//! | Notes and files | [`vault::Vault`] | [`vault::memory::InMemoryVault`] |
//! | Cache records | [`store::CacheStore`] | [`store::memory::InMemoryCacheStore`] |
//! | Remote repository | [`remote::RemoteTransport`] | [`remote::memory::InMemoryRemote`] |
//! | Query rendering | [`integration::renderer::QueryRenderer`] | [`integration::renderer::StaticRenderer`] |
//!
//! The `vault-publish` crate provides the filesystem, SQLite, GitHub and
//! subprocess implementations.

pub mod cache;
pub mod compiler;
pub mod frontmatter;
pub mod hash;
pub mod integration;
pub mod markdown;
pub mod models;
pub mod publish;
pub mod remote;
pub mod settings;
pub mod status;
pub mod store;
pub mod svg;
pub mod vault;
