//! Wiki-link resolution over a set of vault paths.
//!
//! Shared by every [`DocumentStore`](super::DocumentStore) implementation
//! so that link lookup behaves the same in tests and on disk.

use std::collections::BTreeSet;

/// Collapse `.` and `..` segments and duplicate slashes.
///
/// `..` at the root is dropped rather than escaping the vault.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// The file part of a link, without any `#heading` or `#^block` suffix.
pub fn link_target(raw_ref: &str) -> &str {
    let file = match raw_ref.find('#') {
        Some(i) => &raw_ref[..i],
        None => raw_ref,
    };
    file.trim()
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// Resolve `raw_ref` (as written in `from_path`) against `paths`.
///
/// Lookup order: exact vault path, path relative to the linking note's
/// folder, then any file whose path ends with the link (shortest path wins,
/// ties broken lexically). Each step tries the link as written and with
/// `.md` appended.
pub fn resolve_link(paths: &BTreeSet<String>, raw_ref: &str, from_path: &str) -> Option<String> {
    let target = link_target(raw_ref);
    if target.is_empty() {
        return paths.contains(from_path).then(|| from_path.to_string());
    }

    let lookup = |candidate: &str| -> Option<String> {
        if candidate.is_empty() {
            return None;
        }
        if paths.contains(candidate) {
            return Some(candidate.to_string());
        }
        let with_md = format!("{}.md", candidate);
        paths.contains(&with_md).then_some(with_md)
    };

    let absolute = normalize_path(target.trim_start_matches('/'));
    if let Some(found) = lookup(&absolute) {
        return Some(found);
    }

    let dir = parent_dir(from_path);
    if !dir.is_empty() {
        let relative = normalize_path(&format!("{}/{}", dir, target));
        if let Some(found) = lookup(&relative) {
            return Some(found);
        }
    }

    let suffix = format!("/{}", absolute);
    let suffix_md = format!("/{}.md", absolute);
    paths
        .iter()
        .filter(|p| p.ends_with(&suffix) || p.ends_with(&suffix_md))
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .cloned()
}
