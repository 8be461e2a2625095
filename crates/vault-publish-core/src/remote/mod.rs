//! Remote repository transport.
//!
//! The publisher only needs a tree listing with blob hashes, single-file
//! reads, and two batch writes. Each batch write lands as exactly one
//! commit, so a failed batch leaves the remote untouched.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::PublishFile;

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTreeEntry {
    pub path: String,
    /// Git object hash; for blobs, the blob hash of the file content.
    pub hash: String,
    pub kind: EntryKind,
}

/// Content of a single remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub text: String,
    pub hash: String,
}

#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Recursive listing of the tree at `git_ref` (a branch name).
    async fn get_tree(&self, git_ref: &str) -> Result<Vec<RemoteTreeEntry>>;

    /// Content of one file on the default branch, `None` if absent.
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>>;

    /// Upload every file and its assets in one commit.
    async fn update_files(&self, files: &[PublishFile]) -> Result<()>;

    /// Delete every path in one commit.
    async fn delete_files(&self, paths: &[String]) -> Result<()>;
}
