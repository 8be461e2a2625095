//! Document store abstraction.
//!
//! The compile pipeline never touches the filesystem directly. It reads
//! notes, metadata and binary assets through [`DocumentStore`] and
//! [`BinaryStore`], so the same pipeline runs over the native filesystem
//! vault and the in-memory vault used in tests.

pub mod memory;
pub mod resolve;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentMetadata, SourceDocument};

/// Read access to the notes of a vault.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Raw text of a note.
    async fn read_text(&self, path: &str) -> Result<String>;

    /// Frontmatter, heading/block index, and timestamps of a note.
    async fn metadata(&self, path: &str) -> Result<DocumentMetadata>;

    /// Resolve a wiki-style link target as written in `from_path`.
    ///
    /// `raw_ref` may carry a `#heading` or `#^block` suffix, which is
    /// ignored. Returns the vault-relative path of the target file (of any
    /// type), or `None` when nothing matches.
    fn resolve_link(&self, raw_ref: &str, from_path: &str) -> Option<String>;

    /// All Markdown notes in the vault, sorted by path.
    fn list_documents(&self) -> Vec<String>;

    /// Read a note and its metadata as one snapshot.
    async fn read_document(&self, path: &str) -> Result<SourceDocument> {
        let text = self.read_text(path).await?;
        let metadata = self.metadata(path).await?;
        Ok(SourceDocument {
            path: path.to_string(),
            text,
            metadata,
        })
    }
}

/// Read access to binary files (images, drawings, attachments).
#[async_trait]
pub trait BinaryStore: Send + Sync {
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>>;
}

/// A complete vault: notes plus binary files.
pub trait Vault: DocumentStore + BinaryStore {}

impl<T: DocumentStore + BinaryStore> Vault for T {}

/// Whether a vault-relative path is a Markdown note.
pub fn is_markdown(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".md")
}

/// Path without its final extension (`folder/note.md` → `folder/note`).
pub fn extensionless(path: &str) -> &str {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..file_start + dot],
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_helpers() {
        assert!(is_markdown("a/b.md"));
        assert!(is_markdown("A.MD"));
        assert!(!is_markdown("a/b.png"));
        assert_eq!(extensionless("folder/note.md"), "folder/note");
        assert_eq!(extensionless("drawing.excalidraw.md"), "drawing.excalidraw");
        assert_eq!(extensionless("v1.2/README"), "v1.2/README");
        assert_eq!(extensionless(".hidden"), ".hidden");
    }
}
