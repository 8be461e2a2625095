//! External renderer processes.
//!
//! A [`CommandRenderer`] spawns the configured command once per request,
//! writes the request as one JSON object to its stdin, and collects stdout
//! in a background task. The job is settled when the process exits; a
//! non-zero exit turns into an error carrying the process's stderr.
//!
//! ```text
//! start(request) ──spawn──▶ child ◀── stdin: {"kind","language","source","path"}
//!                             │
//!                   stdout ──▶ JobState.output   (grows while running)
//!                   exit   ──▶ JobState.settled
//! ```

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use vault_publish_core::integration::renderer::{QueryRenderer, RenderJob, RenderRequest};
use vault_publish_core::integration::RendererSet;

use crate::config::{Config, RendererConfig};

pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    prefix: Option<String>,
}

impl CommandRenderer {
    pub fn new(config: &RendererConfig) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| anyhow!("renderer command must not be empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            prefix: config.inline_prefix.clone(),
        })
    }
}

/// Renderers for every `[renderers.<id>]` table in `config`.
pub fn renderer_set(config: &Config) -> Result<RendererSet> {
    let mut set = RendererSet::default();
    for (id, renderer_config) in &config.renderers {
        let renderer: Arc<dyn QueryRenderer> = Arc::new(CommandRenderer::new(renderer_config)?);
        match id.as_str() {
            "dataview" => set.dataview = Some(renderer),
            "datacore" => set.datacore = Some(renderer),
            "excalidraw" => set.excalidraw = Some(renderer),
            "statblocks" => set.statblocks = Some(renderer),
            other => anyhow::bail!("Unknown renderer: '{}'", other),
        }
    }
    Ok(set)
}

/// Whether `program` names an existing file or something on `PATH`.
fn program_exists(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return Path::new(program).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

#[derive(Default)]
struct JobState {
    output: Mutex<Vec<u8>>,
    error: Mutex<Option<String>>,
    settled: AtomicBool,
}

struct CommandJob {
    state: Arc<JobState>,
    task: JoinHandle<()>,
}

impl RenderJob for CommandJob {
    fn is_settled(&self) -> bool {
        self.state.settled.load(Ordering::SeqCst)
    }

    fn output(&self) -> Result<String> {
        if let Some(message) = self
            .state
            .error
            .lock()
            .map_err(|_| anyhow!("renderer state poisoned"))?
            .as_ref()
        {
            return Err(anyhow!("{}", message));
        }
        let output = self
            .state
            .output
            .lock()
            .map_err(|_| anyhow!("renderer state poisoned"))?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}

impl Drop for CommandJob {
    fn drop(&mut self) {
        // Dropping the child kills it.
        self.task.abort();
    }
}

#[async_trait]
impl QueryRenderer for CommandRenderer {
    fn is_available(&self) -> Result<bool> {
        Ok(program_exists(&self.program))
    }

    fn inline_prefix(&self) -> Option<String> {
        self.prefix.clone()
    }

    async fn start(&self, request: RenderRequest) -> Result<Box<dyn RenderJob>> {
        let payload = serde_json::to_vec(&request)?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn renderer '{}'", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!(program = %self.program, error = %e, "renderer closed stdin early");
            }
        }

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("renderer stdout unavailable"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("renderer stderr unavailable"))?;

        let state = Arc::new(JobState::default());
        let task_state = state.clone();
        let program = self.program.clone();
        let task = tokio::spawn(async move {
            let read_stdout = async {
                let mut buf = [0u8; 8192];
                loop {
                    match stdout.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            if let Ok(mut output) = task_state.output.lock() {
                                output.extend_from_slice(&buf[..n]);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(program = %program, error = %e, "renderer stdout failed");
                            break;
                        }
                    }
                }
            };
            let read_stderr = async {
                let mut bytes = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut bytes).await {
                    tracing::debug!(program = %program, error = %e, "renderer stderr failed");
                }
                String::from_utf8_lossy(&bytes).into_owned()
            };
            let ((), stderr_text) = tokio::join!(read_stdout, read_stderr);

            let failure = match child.wait().await {
                Ok(status) if status.success() => None,
                Ok(status) => Some(format!(
                    "renderer '{}' exited with {}: {}",
                    program,
                    status,
                    stderr_text.trim()
                )),
                Err(e) => Some(format!("renderer '{}' failed: {}", program, e)),
            };
            if let Some(message) = failure {
                if let Ok(mut error) = task_state.error.lock() {
                    *error = Some(message);
                }
            }
            task_state.settled.store(true, Ordering::SeqCst);
        });

        Ok(Box::new(CommandJob { state, task }))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use vault_publish_core::integration::renderer::{render, PollSettings, RenderKind};
    use std::time::Duration;

    fn renderer(command: &[&str]) -> CommandRenderer {
        CommandRenderer::new(&RendererConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            inline_prefix: Some("=".into()),
        })
        .unwrap()
    }

    fn request(source: &str) -> RenderRequest {
        RenderRequest {
            kind: RenderKind::Block,
            language: "dataview".into(),
            source: source.into(),
            path: "a.md".into(),
        }
    }

    fn patient() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(10),
            max_attempts: 500,
        }
    }

    #[tokio::test]
    async fn echoes_request_json() {
        let r = renderer(&["sh", "-c", "cat"]);
        assert!(r.is_available().unwrap());
        assert_eq!(r.inline_prefix().as_deref(), Some("="));

        let out = render(&r, request("LIST"), patient()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["kind"], "block");
        assert_eq!(value["language"], "dataview");
        assert_eq!(value["source"], "LIST");
        assert_eq!(value["path"], "a.md");
    }

    #[tokio::test]
    async fn failure_carries_stderr() {
        let r = renderer(&["sh", "-c", "echo boom >&2; exit 3"]);
        let err = render(&r, request("x"), patient()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn failure_keeps_non_utf8_stderr() {
        let r = renderer(&["sh", "-c", "printf '\\377bad input' >&2; exit 2"]);
        let err = render(&r, request("x"), patient()).await.unwrap_err();
        assert!(err.to_string().contains("bad input"));
    }

    #[tokio::test]
    async fn unsettled_job_yields_partial_output() {
        let r = renderer(&["sh", "-c", "printf partial; sleep 5"]);
        let poll = PollSettings {
            interval: Duration::from_millis(20),
            max_attempts: 25,
        };
        let out = render(&r, request("x"), poll).await.unwrap();
        assert_eq!(out, "partial");
    }

    #[test]
    fn missing_program_is_unavailable() {
        let r = renderer(&["definitely-not-a-renderer-binary"]);
        assert!(!r.is_available().unwrap());
    }

    #[test]
    fn builds_set_from_config() {
        let config: Config = toml::from_str(
            r#"
[db]
path = "x.sqlite"
[vault]
root = "."
[renderers.datacore]
command = ["node", "dc.js"]
"#,
        )
        .unwrap();
        let set = renderer_set(&config).unwrap();
        assert!(set.datacore.is_some());
        assert!(set.dataview.is_none());
    }
}
