//! Markdown scanning helpers shared by the vault indexer and the compiler.
//!
//! Nothing here builds a full Markdown AST. The compiler works on raw text
//! and only needs to know where frontmatter, code fences, inline code spans,
//! headings and block ids sit, so each of those is found with a line scan
//! or a small regex.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{BlockPosition, DocumentMetadata, Frontmatter, Heading};

static FRONTMATTER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*---\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)").expect("frontmatter regex")
});

static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(.*?)[ \t#]*$").expect("heading regex"));

static BLOCK_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)\^([A-Za-z0-9-]+)[ \t]*$").expect("block id regex"));

static BLOCK_ID_STRIP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|[ \t]+)\^[A-Za-z0-9-]+[ \t]*$").expect("block id strip regex")
});

static INLINE_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]+`").expect("inline code regex"));

static LIST_ITEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s").expect("list item regex"));

/// Byte range of the leading frontmatter block, including both delimiters.
pub fn frontmatter_range(text: &str) -> Option<Range<usize>> {
    FRONTMATTER_REGEX.find(text).map(|m| m.range())
}

/// Text with the leading frontmatter block removed.
pub fn strip_frontmatter(text: &str) -> &str {
    match frontmatter_range(text) {
        Some(range) => &text[range.end..],
        None => text,
    }
}

/// Parse the leading YAML frontmatter into a JSON map.
///
/// Malformed YAML yields an empty map; the note still compiles.
pub fn parse_frontmatter(text: &str) -> Frontmatter {
    let Some(caps) = FRONTMATTER_REGEX.captures(text) else {
        return Frontmatter::new();
    };
    let yaml = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    if yaml.trim().is_empty() {
        return Frontmatter::new();
    }
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Frontmatter::new(),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed frontmatter");
            Frontmatter::new()
        }
    }
}

/// Byte ranges of fenced code blocks (``` or ~~~), fences included.
pub fn code_fence_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<(usize, &str)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let fence = if trimmed.starts_with("```") {
            Some("```")
        } else if trimmed.starts_with("~~~") {
            Some("~~~")
        } else {
            None
        };

        match (open, fence) {
            (None, Some(f)) => open = Some((offset, f)),
            (Some((start, f)), Some(g)) if f == g && trimmed.trim_end().trim_start_matches(g).is_empty() => {
                ranges.push(start..offset + line.len());
                open = None;
            }
            _ => {}
        }
        offset += line.len();
    }

    if let Some((start, _)) = open {
        ranges.push(start..text.len());
    }
    ranges
}

/// Byte ranges the link and embed rewriters must not touch: frontmatter,
/// fenced code blocks, and inline code spans.
pub fn protected_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = code_fence_ranges(text);
    if let Some(fm) = frontmatter_range(text) {
        ranges.push(fm);
    }
    let spans: Vec<Range<usize>> = INLINE_CODE_REGEX
        .find_iter(text)
        .map(|m| m.range())
        .filter(|r| !ranges.iter().any(|p| p.contains(&r.start)))
        .collect();
    ranges.extend(spans);
    ranges.sort_by_key(|r| r.start);
    ranges
}

pub fn in_ranges(ranges: &[Range<usize>], pos: usize) -> bool {
    ranges.iter().any(|r| r.contains(&pos))
}

/// Index headings and block ids of a note.
pub fn index_document(text: &str, created_ms: i64, modified_ms: i64) -> DocumentMetadata {
    let fences = code_fence_ranges(text);
    let frontmatter_end = frontmatter_range(text).map(|r| r.end).unwrap_or(0);

    let lines: Vec<&str> = text.split('\n').collect();
    let mut headings = Vec::new();
    let mut blocks = BTreeMap::new();
    let mut offset = 0;

    for (line_no, line) in lines.iter().enumerate() {
        let line_start = offset;
        offset += line.len() + 1;
        if line_start < frontmatter_end || in_ranges(&fences, line_start) {
            continue;
        }
        let line = line.trim_end_matches('\r');

        if let Some(caps) = HEADING_REGEX.captures(line) {
            headings.push(Heading {
                text: caps[2].to_string(),
                level: caps[1].len(),
                line: line_no,
            });
            continue;
        }

        if let Some(caps) = BLOCK_ID_REGEX.captures(line) {
            let id = caps[1].to_string();
            let start_line = block_start(&lines, line_no);
            blocks.insert(
                id,
                BlockPosition {
                    start_line,
                    end_line: line_no,
                },
            );
        }
    }

    DocumentMetadata {
        frontmatter: parse_frontmatter(text),
        headings,
        blocks,
        created_ms,
        modified_ms,
    }
}

/// First line of the block that ends with a `^id` marker on `line_no`.
///
/// A marker on a line of its own tags the paragraph above it; a marker on
/// a list item tags only that item; otherwise the enclosing paragraph.
fn block_start(lines: &[&str], line_no: usize) -> usize {
    let line = lines[line_no].trim();
    if LIST_ITEM_REGEX.is_match(lines[line_no]) {
        return line_no;
    }
    let mut start = line_no;
    if line.starts_with('^') && line_no > 0 {
        if lines[line_no - 1].trim().is_empty() {
            // `^id` after a blank line refers to the block before the gap.
            let mut prev = line_no - 1;
            while prev > 0 && lines[prev].trim().is_empty() {
                prev -= 1;
            }
            start = prev;
        } else {
            start = line_no - 1;
        }
    }
    while start > 0 {
        let prev = lines[start - 1].trim_end_matches('\r');
        if prev.trim().is_empty() || HEADING_REGEX.is_match(prev) || LIST_ITEM_REGEX.is_match(lines[start]) {
            break;
        }
        start -= 1;
    }
    start
}

/// Remove `^blockid` markers from the end of every line.
pub fn strip_block_ids(text: &str) -> String {
    BLOCK_ID_STRIP_REGEX.replace_all(text, "").into_owned()
}

/// Normalize a heading title for comparison.
///
/// Every run of non-alphanumeric characters collapses to a single `-`, so
/// `My Heading: Part 1` and `My Heading Part 1` compare equal while case
/// stays significant.
pub fn normalize_heading(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_sep = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}
