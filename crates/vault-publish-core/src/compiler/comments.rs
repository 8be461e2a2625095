//! `%% comment %%` stripping.

use std::sync::LazyLock;

use regex::Regex;

static COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)%%.*?%%").expect("comment regex"));

static CODE_BLOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("code block regex"));

static CODE_SPAN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]*`").expect("code span regex"));

/// Element links inside an embedded drawing scene, e.g. `:[[12,34],...]]:`.
static DRAWING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s):\[\[(\d*?,\d*?)\],.*?\]\]:").expect("drawing regex"));

/// Remove every comment that is not part of a code block, a code span or
/// a drawing scene.
///
/// A comment is kept when its whole text occurs inside any of those
/// regions.
pub fn strip_comments(text: &str) -> String {
    let guarded: Vec<&str> = CODE_BLOCK_REGEX
        .find_iter(text)
        .chain(CODE_SPAN_REGEX.find_iter(text))
        .chain(DRAWING_REGEX.find_iter(text))
        .map(|m| m.as_str())
        .collect();

    COMMENT_REGEX
        .replace_all(text, |caps: &regex::Captures| {
            let comment = &caps[0];
            if guarded.iter().any(|g| g.contains(comment)) {
                comment.to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}
