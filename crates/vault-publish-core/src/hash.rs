//! Git-compatible content hashing.
//!
//! Compiled notes and assets are identified by the same SHA-1 blob hash
//! Git stores in its trees: `sha1("blob " + len + "\0" + content)`. This
//! lets the publish-status differ compare local output against a remote
//! tree listing without downloading any file contents.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

/// Hash raw bytes as a Git blob.
pub fn git_blob_hash(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Hash a compiled note's text as a Git blob.
pub fn text_hash(text: &str) -> String {
    git_blob_hash(text.as_bytes())
}

/// Hash base64-encoded asset content as the Git blob of its decoded bytes.
pub fn base64_blob_hash(content_base64: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(content_base64)
        .context("asset content is not valid base64")?;
    Ok(git_blob_hash(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_git_hash_object() {
        // `printf 'hello world' | git hash-object --stdin`
        assert_eq!(
            text_hash("hello world"),
            "95d09f2b10159347eece71399a7e2e907ea3df4f"
        );
        // `git hash-object /dev/null`
        assert_eq!(text_hash(""), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn hashing_is_deterministic() {
        let content = "---\n{\"publish\":true}\n---\n# Title\n";
        assert_eq!(text_hash(content), text_hash(content));
    }

    #[test]
    fn hashing_is_sensitive_to_every_byte() {
        let a = text_hash("The quick brown fox");
        let b = text_hash("The quick brown fax");
        let c = text_hash("The quick brown fox ");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn base64_hash_matches_raw_hash() {
        let raw = b"\x89PNG\r\n\x1a\n";
        let encoded = STANDARD.encode(raw);
        assert_eq!(base64_blob_hash(&encoded).unwrap(), git_blob_hash(raw));
    }

    #[test]
    fn base64_hash_rejects_garbage() {
        assert!(base64_blob_hash("not base64!!").is_err());
    }
}
