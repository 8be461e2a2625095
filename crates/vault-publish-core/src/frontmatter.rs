//! Output frontmatter.
//!
//! The published block is derived from the note's source frontmatter and
//! timestamps, starting from `{"publish": true}` and layering fields in a
//! fixed order:
//!
//! | Step | Output keys | Source keys |
//! |------|-------------|-------------|
//! | 1 | `permalink`, `aliases` | `permalink`/`dg-permalink`, `aliases`/`alias` |
//! | 2 | `title`, `description`, `draft`, `comments`, `lang`, `enableToc` | same |
//! | 3 | `created`, `modified`, `published` | configured key, legacy aliases, file times |
//! | 4 | `tags` | `tags`, `tag` |
//! | 5 | `cssclasses` | `cssclasses`, `cssclass` |
//! | 6 | `socialImage`, `socialDescription` | first non-empty alias |
//! | 7 | every source field (source wins) | only with `include_all_frontmatter` |
//!
//! The block is written as single-line JSON between `---` delimiters,
//! which every YAML parser accepts.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::models::{DocumentMetadata, Frontmatter};
use crate::settings::PublishSettings;

const PASS_THROUGH: &[&str] = &["title", "description", "draft", "comments", "lang", "enableToc"];

const CREATED_ALIASES: &[&str] = &["created", "dg-created", "date-created", "date"];
const UPDATED_ALIASES: &[&str] = &["updated", "modified", "dg-updated", "last-modified", "date-modified"];
const PUBLISHED_ALIASES: &[&str] = &["published", "dg-published", "date-published"];

const SOCIAL_IMAGE_ALIASES: &[&str] = &["socialImage", "social-image", "image", "cover", "banner"];
const SOCIAL_DESCRIPTION_ALIASES: &[&str] = &["socialDescription", "social-description"];

/// Build the output fields for a note.
pub fn build_fields(meta: &DocumentMetadata, settings: &PublishSettings) -> Frontmatter {
    let source = &meta.frontmatter;
    let mut out = Frontmatter::new();
    out.insert("publish".into(), Value::Bool(true));

    if let Some(permalink) = first_string(source, &["permalink", "dg-permalink"]) {
        let permalink = if permalink.starts_with('/') {
            permalink
        } else {
            format!("/{}", permalink)
        };
        out.insert("permalink".into(), Value::String(permalink));
    }
    let aliases = string_list(source, &["aliases", "alias"], |c| c == ',');
    if !aliases.is_empty() {
        out.insert("aliases".into(), strings_value(aliases));
    }

    for key in PASS_THROUGH {
        if let Some(value) = source.get(*key).filter(|v| !v.is_null()) {
            out.insert(key.to_string(), value.clone());
        }
    }

    let include_all = settings.include_all_frontmatter;
    let timestamps = [
        (
            "created",
            settings.show_created_timestamp,
            &settings.created_timestamp_key,
            CREATED_ALIASES,
            Some(meta.created_ms),
        ),
        (
            "modified",
            settings.show_updated_timestamp,
            &settings.updated_timestamp_key,
            UPDATED_ALIASES,
            Some(meta.modified_ms),
        ),
        (
            "published",
            settings.show_published_timestamp,
            &settings.published_timestamp_key,
            PUBLISHED_ALIASES,
            None,
        ),
    ];
    for (key, show, custom_key, aliases, computed_ms) in timestamps {
        if !(show || include_all) {
            continue;
        }
        let mut keys: Vec<&str> = Vec::new();
        if !custom_key.trim().is_empty() {
            keys.push(custom_key.trim());
        }
        keys.extend_from_slice(aliases);
        let value = first_string(source, &keys).or_else(|| computed_ms.and_then(format_ms));
        if let Some(value) = value {
            out.insert(key.into(), Value::String(value));
        }
    }

    let tags: Vec<String> = string_list(source, &["tags", "tag"], |c| c == ',' || c.is_whitespace())
        .into_iter()
        .map(|t| t.trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect();
    let tags = dedup(tags);
    if !tags.is_empty() {
        out.insert("tags".into(), strings_value(tags));
    }

    let classes = dedup(string_list(source, &["cssclasses", "cssclass"], |c| {
        c == ',' || c.is_whitespace()
    }));
    if !classes.is_empty() {
        out.insert("cssclasses".into(), Value::String(classes.join(" ")));
    }

    if let Some(image) = first_string(source, SOCIAL_IMAGE_ALIASES) {
        out.insert("socialImage".into(), Value::String(image));
    }
    if let Some(description) = first_string(source, SOCIAL_DESCRIPTION_ALIASES) {
        out.insert("socialDescription".into(), Value::String(description));
    }

    if include_all {
        for (key, value) in source {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

/// The `---` delimited output block, ending with a newline.
pub fn compile_frontmatter(meta: &DocumentMetadata, settings: &PublishSettings) -> String {
    let fields = Value::Object(build_fields(meta, settings));
    format!("---\n{}\n---\n", fields)
}

fn format_ms(ms: i64) -> Option<String> {
    if ms <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(ms).map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn scalar_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// First non-empty scalar among `keys`, as a string.
fn first_string(source: &Frontmatter, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| source.get(*k))
        .find_map(scalar_string)
}

/// Strings from every key in `keys`; string values are split on `sep`.
fn string_list(source: &Frontmatter, keys: &[&str], sep: impl Fn(char) -> bool + Copy) -> Vec<String> {
    let mut out = Vec::new();
    for key in keys {
        match source.get(*key) {
            Some(Value::Array(items)) => out.extend(items.iter().filter_map(scalar_string)),
            Some(Value::String(s)) => out.extend(
                s.split(sep)
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            ),
            Some(other) => out.extend(scalar_string(other)),
            None => {}
        }
    }
    out
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

fn strings_value(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}
