//! Core data models used throughout vault-publish.
//!
//! These types represent the source notes, compiled output, and extracted
//! assets that flow through the compile pipeline and into the cache.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Frontmatter key/value block, kept in source order.
pub type Frontmatter = Map<String, Value>;

/// A heading found in a note, with its zero-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub text: String,
    pub level: usize,
    pub line: usize,
}

/// Inclusive line range of a block tagged with `^blockid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPosition {
    pub start_line: usize,
    pub end_line: usize,
}

/// Index data a document store exposes for one note.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub frontmatter: Frontmatter,
    pub headings: Vec<Heading>,
    pub blocks: BTreeMap<String, BlockPosition>,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_ms: i64,
    /// Last modification time in milliseconds since the Unix epoch.
    pub modified_ms: i64,
}

/// Immutable snapshot of a note for one compilation pass.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Vault-relative path, forward-slash separated (e.g. `"folder/note.md"`).
    pub path: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl SourceDocument {
    /// File name without the folder part.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A binary file extracted from a note, addressed by its output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Site path, e.g. `/img/user/folder/image.png`.
    pub output_path: String,
    pub content_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_hash: Option<String>,
}

/// Output of the compile pipeline for one note.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompiledDocument {
    pub text: String,
    pub assets: Vec<Asset>,
}

impl CompiledDocument {
    pub fn new(text: impl Into<String>, assets: Vec<Asset>) -> Self {
        Self {
            text: text.into(),
            assets,
        }
    }
}

/// A file ready to be written to the remote repository.
#[derive(Debug, Clone)]
pub struct PublishFile {
    /// Remote repository path of the note.
    pub remote_path: String,
    pub text: String,
    /// Assets to upload alongside the note, keyed by remote path.
    pub assets: Vec<RemoteAsset>,
}

/// Asset with its remote repository path resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    pub remote_path: String,
    pub content_base64: String,
}
