//! TOML configuration for the `vpub` CLI.
//!
//! ```toml
//! [db]
//! path = "./.vpub/cache.sqlite"
//!
//! [vault]
//! root = "./notes"
//!
//! [publish]            # see vault_publish_core::settings::PublishSettings
//! vault_path = "/"
//!
//! [remote]
//! owner = "me"
//! repo = "garden"
//!
//! [renderers.dataview]
//! command = ["node", "scripts/dataview.js"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use vault_publish_core::settings::PublishSettings;

/// Renderer ids that map onto a renderer-backed integration.
pub const RENDERER_IDS: &[&str] = &["dataview", "datacore", "excalidraw", "statblocks"];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub vault: VaultConfig,
    #[serde(default)]
    pub publish: PublishSettings,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub renderers: BTreeMap<String, RendererConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Name of the environment variable holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_branch() -> String {
    "main".to_string()
}
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

/// An external renderer process, spawned once per render request.
#[derive(Debug, Deserialize, Clone)]
pub struct RendererConfig {
    pub command: Vec<String>,
    /// Inline query prefix reported to the integration (dataview only).
    #[serde(default)]
    pub inline_prefix: Option<String>,
}

impl Config {
    /// The `[remote]` table, required by commands that talk to the remote.
    pub fn remote(&self) -> Result<&RemoteConfig> {
        self.remote
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("[remote] is not configured"))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let vault_path = config.publish.vault_path.trim();
    if vault_path != "/" && (vault_path.starts_with('/') || Path::new(vault_path).is_absolute()) {
        bail!(
            "publish.vault_path must be relative to the vault root (or \"/\"), got '{}'",
            vault_path
        );
    }

    if let Some(remote) = &config.remote {
        if remote.owner.trim().is_empty() {
            bail!("remote.owner must not be empty");
        }
        if remote.repo.trim().is_empty() {
            bail!("remote.repo must not be empty");
        }
        if remote.branch.trim().is_empty() {
            bail!("remote.branch must not be empty");
        }
    }

    for (id, renderer) in &config.renderers {
        if !RENDERER_IDS.contains(&id.as_str()) {
            bail!(
                "Unknown renderer: '{}'. Must be one of {}.",
                id,
                RENDERER_IDS.join(", ")
            );
        }
        if renderer.command.is_empty() || renderer.command[0].trim().is_empty() {
            bail!("renderers.{}.command must not be empty", id);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
[db]
path = "./cache.sqlite"

[vault]
root = "./notes"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.publish.vault_path, "/");
        assert_eq!(config.publish.notes_root, "content");
        assert!(config.remote.is_none());
        assert!(config.remote().is_err());
        assert!(config.renderers.is_empty());
    }

    #[test]
    fn remote_defaults() {
        let config = parse(&format!(
            "{}\n[remote]\nowner = \"me\"\nrepo = \"garden\"\n",
            MINIMAL
        ))
        .unwrap();
        let remote = config.remote().unwrap();
        assert_eq!(remote.branch, "main");
        assert_eq!(remote.api_url, "https://api.github.com");
        assert_eq!(remote.token_env, "GITHUB_TOKEN");
        assert_eq!(remote.max_retries, 3);
    }

    #[test]
    fn rejects_empty_repo() {
        let err = parse(&format!(
            "{}\n[remote]\nowner = \"me\"\nrepo = \"\"\n",
            MINIMAL
        ))
        .unwrap_err();
        assert!(err.to_string().contains("remote.repo"));
    }

    #[test]
    fn rejects_absolute_vault_path() {
        let err = parse(&format!("{}\n[publish]\nvault_path = \"/abs\"\n", MINIMAL)).unwrap_err();
        assert!(err.to_string().contains("vault_path"));
    }

    #[test]
    fn renderer_validation() {
        let ok = parse(&format!(
            "{}\n[renderers.dataview]\ncommand = [\"node\", \"dv.js\"]\ninline_prefix = \"=\"\n",
            MINIMAL
        ))
        .unwrap();
        assert_eq!(ok.renderers["dataview"].inline_prefix.as_deref(), Some("="));

        let unknown = parse(&format!(
            "{}\n[renderers.tasks]\ncommand = [\"x\"]\n",
            MINIMAL
        ))
        .unwrap_err();
        assert!(unknown.to_string().contains("Unknown renderer"));

        let empty = parse(&format!("{}\n[renderers.datacore]\ncommand = []\n", MINIMAL)).unwrap_err();
        assert!(empty.to_string().contains("must not be empty"));
    }

    #[test]
    fn integration_gates_are_read() {
        let config = parse(&format!(
            "{}\n[publish.integrations]\ndataview = true\n",
            MINIMAL
        ))
        .unwrap();
        assert!(config.publish.integration_enabled("dataview"));
        assert!(!config.publish.integration_enabled("datacore"));
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse(include_str!("../config/vpub.example.toml")).unwrap();
        assert_eq!(config.remote().unwrap().repo, "garden");
        assert!(config.publish.integration_enabled("auto_card_link"));
        assert_eq!(config.renderers["dataview"].command[0], "node");
    }
}
