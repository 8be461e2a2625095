//! Publishing settings consumed by the compiler and the status differ.
//!
//! Deserialized from the `[publish]` table of the application config; every
//! field has a default so an empty table is valid.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::models::Frontmatter;

#[derive(Debug, Deserialize, Clone)]
pub struct PublishSettings {
    /// Sub-folder of the vault treated as the publishable root (`/` = whole vault).
    #[serde(default = "default_vault_path")]
    pub vault_path: String,
    /// Frontmatter key whose truthy value marks a note for publishing.
    #[serde(default = "default_publish_key")]
    pub publish_key: String,

    #[serde(default)]
    pub show_created_timestamp: bool,
    #[serde(default)]
    pub show_updated_timestamp: bool,
    #[serde(default)]
    pub show_published_timestamp: bool,
    /// Additional source key consulted for the created timestamp.
    #[serde(default)]
    pub created_timestamp_key: String,
    #[serde(default)]
    pub updated_timestamp_key: String,
    #[serde(default)]
    pub published_timestamp_key: String,
    /// Publish every source frontmatter field and every timestamp.
    #[serde(default)]
    pub include_all_frontmatter: bool,

    /// Remote folder that receives compiled notes.
    #[serde(default = "default_content_root")]
    pub notes_root: String,
    /// Remote folder under which `/img/user/...` assets are written.
    #[serde(default = "default_content_root")]
    pub assets_root: String,
    /// Remote folder that receives integration stylesheets.
    #[serde(default = "default_styles_root")]
    pub styles_root: String,

    /// Integration settings-gate keys (e.g. `dataview = true`).
    #[serde(default)]
    pub integrations: BTreeMap<String, bool>,
}

fn default_vault_path() -> String {
    "/".to_string()
}
fn default_publish_key() -> String {
    "publish".to_string()
}
fn default_content_root() -> String {
    "content".to_string()
}
fn default_styles_root() -> String {
    "quartz/styles/syncer".to_string()
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            vault_path: default_vault_path(),
            publish_key: default_publish_key(),
            show_created_timestamp: false,
            show_updated_timestamp: false,
            show_published_timestamp: false,
            created_timestamp_key: String::new(),
            updated_timestamp_key: String::new(),
            published_timestamp_key: String::new(),
            include_all_frontmatter: false,
            notes_root: default_content_root(),
            assets_root: default_content_root(),
            styles_root: default_styles_root(),
            integrations: BTreeMap::new(),
        }
    }
}

impl PublishSettings {
    /// Whether the integration behind `setting_key` is switched on.
    pub fn integration_enabled(&self, setting_key: &str) -> bool {
        self.integrations.get(setting_key).copied().unwrap_or(false)
    }

    /// Normalized vault scope prefix with a trailing slash, or `None` for the
    /// whole vault.
    pub fn vault_prefix(&self) -> Option<String> {
        let trimmed = self.vault_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("{}/", trimmed))
        }
    }

    /// Whether a vault-relative path lies inside the publishable scope.
    pub fn in_scope(&self, path: &str) -> bool {
        match self.vault_prefix() {
            Some(prefix) => path.starts_with(&prefix),
            None => true,
        }
    }

    /// Vault path with the scope prefix removed.
    pub fn scoped_path<'a>(&self, path: &'a str) -> &'a str {
        match self.vault_prefix() {
            Some(prefix) => path.strip_prefix(prefix.as_str()).unwrap_or(path),
            None => path,
        }
    }

    /// Whether a note's frontmatter marks it for publishing.
    pub fn is_marked(&self, frontmatter: &Frontmatter) -> bool {
        match frontmatter.get(&self.publish_key) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Remote repository path of a compiled note.
    pub fn remote_note_path(&self, vault_path: &str) -> String {
        join_remote(&self.notes_root, self.scoped_path(vault_path))
    }

    /// Remote repository path of an extracted asset (`/img/user/...`).
    pub fn remote_asset_path(&self, output_path: &str) -> String {
        join_remote(&self.assets_root, output_path)
    }

    /// Remote folder holding extracted assets.
    pub fn remote_asset_dir(&self) -> String {
        join_remote(&self.assets_root, "img/user")
    }

    /// Remote path of an integration stylesheet.
    pub fn remote_style_path(&self, integration_id: &str) -> String {
        join_remote(&self.styles_root, &format!("_{}.scss", integration_id))
    }
}

fn join_remote(root: &str, rest: &str) -> String {
    let root = root.trim_matches('/');
    let rest = rest.trim_start_matches('/');
    if root.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", root, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vault_prefix_normalization() {
        let mut s = PublishSettings::default();
        assert_eq!(s.vault_prefix(), None);
        s.vault_path = "".into();
        assert_eq!(s.vault_prefix(), None);
        s.vault_path = "sub".into();
        assert_eq!(s.vault_prefix().as_deref(), Some("sub/"));
        s.vault_path = "/sub/".into();
        assert_eq!(s.vault_prefix().as_deref(), Some("sub/"));
        assert!(s.in_scope("sub/a.md"));
        assert!(!s.in_scope("subway/a.md"));
        assert_eq!(s.scoped_path("sub/x/a.md"), "x/a.md");
    }

    #[test]
    fn remote_paths() {
        let mut s = PublishSettings {
            vault_path: "garden/".into(),
            ..Default::default()
        };
        assert_eq!(s.remote_note_path("garden/topics/a.md"), "content/topics/a.md");
        assert_eq!(s.remote_asset_path("/img/user/x.png"), "content/img/user/x.png");
        assert_eq!(s.remote_asset_dir(), "content/img/user");
        s.notes_root = "".into();
        assert_eq!(s.remote_note_path("garden/a.md"), "a.md");
        assert_eq!(s.remote_style_path("dataview"), "quartz/styles/syncer/_dataview.scss");
    }

    #[test]
    fn publish_flag() {
        let s = PublishSettings::default();
        let fm = |v: serde_json::Value| v.as_object().unwrap().clone();
        assert!(s.is_marked(&fm(json!({"publish": true}))));
        assert!(s.is_marked(&fm(json!({"publish": "True"}))));
        assert!(!s.is_marked(&fm(json!({"publish": false}))));
        assert!(!s.is_marked(&fm(json!({"title": "x"}))));
    }

    #[test]
    fn deserializes_from_empty_table() {
        let s: PublishSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(s.vault_path, "/");
        assert_eq!(s.publish_key, "publish");
        assert!(!s.integration_enabled("dataview"));
    }
}
