//! GitHub [`RemoteTransport`] over the Git Data API.
//!
//! Reads go through `git/ref → git/commits → git/trees?recursive=1`, and
//! single files through the contents API. Every batch write becomes
//! exactly one commit:
//!
//! ```text
//! blobs (utf-8 notes, base64 assets)
//!   ▼
//! POST git/trees   { base_tree: <head tree>, tree: [...] }
//!   ▼
//! POST git/commits { tree, parents: [<head>] }
//!   ▼
//! PATCH git/refs/heads/<branch> { sha }
//! ```
//!
//! Deletions are tree entries with `sha: null`.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry with backoff
//!   (1s, 2s, 4s, ...)
//! - HTTP 404 → treated as "absent" by the caller
//! - Other 4xx → fail immediately
//! - Network errors → retry

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

use vault_publish_core::models::PublishFile;
use vault_publish_core::remote::{EntryKind, RemoteFile, RemoteTransport, RemoteTreeEntry};

use crate::config::RemoteConfig;

const UPDATE_MESSAGE: &str = "Publish notes";
const DELETE_MESSAGE: &str = "Remove unpublished notes";

pub struct GithubTransport {
    client: reqwest::Client,
    /// `<api_url>/repos/<owner>/<repo>`
    repo_url: String,
    branch: String,
    token: Option<String>,
    max_retries: u32,
    backoff: Duration,
}

#[derive(Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: ShaRef,
}

#[derive(Deserialize)]
struct CommitResponse {
    tree: ShaRef,
}

#[derive(Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: EntryKind,
    sha: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: String,
    sha: String,
    #[serde(default)]
    encoding: String,
}

impl GithubTransport {
    /// Build a transport from config, reading the token from `token_env`.
    pub fn from_config(remote: &RemoteConfig) -> Result<Self> {
        let token = std::env::var(&remote.token_env).ok();
        if token.is_none() {
            tracing::warn!(var = %remote.token_env, "no access token set; requests are unauthenticated");
        }
        Self::new(remote, token)
    }

    pub fn new(remote: &RemoteConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(remote.timeout_secs))
            .user_agent(concat!("vault-publish/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            repo_url: format!(
                "{}/repos/{}/{}",
                remote.api_url.trim_end_matches('/'),
                remote.owner,
                remote.repo
            ),
            branch: remote.branch.clone(),
            token,
            max_retries: remote.max_retries,
            backoff: Duration::from_secs(1),
        })
    }

    /// Override the base retry delay.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn url(&self, suffix: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.repo_url, suffix))
            .with_context(|| format!("invalid remote url for {}", suffix))
    }

    fn contents_url(&self, path: &str) -> Result<Url> {
        let mut url = self.url("contents")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("remote api url cannot be a base"))?
            .extend(path.split('/'));
        url.query_pairs_mut().append_pair("ref", &self.branch);
        Ok(url)
    }

    /// Send a request with retry/backoff. `Ok(None)` means HTTP 404.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Option<T>> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .header("Accept", "application/vnd.github+json");
            if let Some(token) = &self.token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed = response
                            .json::<T>()
                            .await
                            .with_context(|| format!("invalid response from {} {}", method, url))?;
                        return Ok(Some(parsed));
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::debug!(%status, %url, attempt, "retrying remote request");
                        last_err = Some(anyhow!("GitHub API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("GitHub API error {} for {} {}: {}", status, method, url, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("GitHub request failed after retries")))
    }

    async fn require<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<T> {
        let what = format!("{} {}", method, url);
        self.send(method, url, body)
            .await?
            .ok_or_else(|| anyhow!("not found: {}", what))
    }

    async fn head_sha(&self) -> Result<String> {
        let url = self.url(&format!("git/ref/heads/{}", self.branch))?;
        let head: RefResponse = self
            .require(Method::GET, url, None)
            .await
            .with_context(|| format!("failed to read branch {}", self.branch))?;
        Ok(head.object.sha)
    }

    async fn tree_of(&self, commit_sha: &str) -> Result<String> {
        let url = self.url(&format!("git/commits/{}", commit_sha))?;
        let commit: CommitResponse = self.require(Method::GET, url, None).await?;
        Ok(commit.tree.sha)
    }

    async fn create_blob(&self, content: &str, encoding: &str) -> Result<String> {
        let body = json!({ "content": content, "encoding": encoding });
        let blob: ShaRef = self
            .require(Method::POST, self.url("git/blobs")?, Some(&body))
            .await?;
        Ok(blob.sha)
    }

    /// Apply `entries` on top of the branch head as one commit.
    async fn commit(&self, entries: Vec<Value>, message: &str) -> Result<()> {
        let head = self.head_sha().await?;
        let base_tree = self.tree_of(&head).await?;

        let tree_body = json!({ "base_tree": base_tree, "tree": entries });
        let tree: ShaRef = self
            .require(Method::POST, self.url("git/trees")?, Some(&tree_body))
            .await
            .context("failed to create tree")?;

        let commit_body = json!({ "message": message, "tree": tree.sha, "parents": [head] });
        let commit: ShaRef = self
            .require(Method::POST, self.url("git/commits")?, Some(&commit_body))
            .await
            .context("failed to create commit")?;

        let ref_body = json!({ "sha": commit.sha, "force": false });
        let _: Value = self
            .require(
                Method::PATCH,
                self.url(&format!("git/refs/heads/{}", self.branch))?,
                Some(&ref_body),
            )
            .await
            .with_context(|| format!("failed to move {} to the new commit", self.branch))?;

        tracing::info!(commit = %commit.sha, branch = %self.branch, "created commit");
        Ok(())
    }
}

fn blob_entry(path: &str, sha: Option<&str>) -> Value {
    json!({ "path": path, "mode": "100644", "type": "blob", "sha": sha })
}

#[async_trait]
impl RemoteTransport for GithubTransport {
    async fn get_tree(&self, git_ref: &str) -> Result<Vec<RemoteTreeEntry>> {
        let url = self.url(&format!("git/ref/heads/{}", git_ref))?;
        let head: RefResponse = self
            .require(Method::GET, url, None)
            .await
            .with_context(|| format!("failed to read branch {}", git_ref))?;
        let tree_sha = self.tree_of(&head.object.sha).await?;

        let mut url = self.url(&format!("git/trees/{}", tree_sha))?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let tree: TreeResponse = self.require(Method::GET, url, None).await?;
        if tree.truncated {
            tracing::warn!(git_ref, "remote tree listing was truncated");
        }

        Ok(tree
            .tree
            .into_iter()
            .map(|item| RemoteTreeEntry {
                path: item.path,
                hash: item.sha,
                kind: item.kind,
            })
            .collect())
    }

    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>> {
        let url = self.contents_url(path)?;
        let Some(contents) = self.send::<ContentsResponse>(Method::GET, url, None).await? else {
            return Ok(None);
        };
        let text = if contents.encoding == "base64" {
            let compact: String = contents
                .content
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            let bytes = STANDARD
                .decode(compact)
                .with_context(|| format!("invalid base64 content for {}", path))?;
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            contents.content
        };
        Ok(Some(RemoteFile {
            text,
            hash: contents.sha,
        }))
    }

    async fn update_files(&self, files: &[PublishFile]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        for file in files {
            let sha = self
                .create_blob(&file.text, "utf-8")
                .await
                .with_context(|| format!("failed to upload {}", file.remote_path))?;
            if seen.insert(file.remote_path.clone()) {
                entries.push(blob_entry(&file.remote_path, Some(&sha)));
            }
            for asset in &file.assets {
                if !seen.insert(asset.remote_path.clone()) {
                    continue;
                }
                let sha = self
                    .create_blob(&asset.content_base64, "base64")
                    .await
                    .with_context(|| format!("failed to upload {}", asset.remote_path))?;
                entries.push(blob_entry(&asset.remote_path, Some(&sha)));
            }
        }
        self.commit(entries, UPDATE_MESSAGE).await
    }

    async fn delete_files(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let entries = paths.iter().map(|p| blob_entry(p, None)).collect();
        self.commit(entries, DELETE_MESSAGE).await
    }
}
