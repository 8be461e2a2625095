//! Publish progress reporting.
//!
//! Reports what `vpub status` and `vpub publish` are doing (scanning the
//! vault, comparing with the remote, writing commits) so long runs are
//! observable. Progress is emitted on **stderr** so stdout remains
//! parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum PublishProgressEvent {
    /// The vault has been scanned.
    Scanned { files: u64, notes: u64 },
    /// Marked notes are being compiled and compared with the remote tree.
    Comparing { notes: u64, remote_files: u64 },
    /// One commit with new and changed files is being written.
    Uploading { files: u64, assets: u64 },
    /// One commit removing files is being written.
    Deleting { files: u64 },
}

/// Reports publish progress. Implementations write to stderr (human or JSON).
pub trait PublishProgressReporter: Send + Sync {
    fn report(&self, event: PublishProgressEvent);
}

/// Human-friendly progress on stderr: "vpub  uploading  12 files, 3 assets".
pub struct StderrProgress;

impl PublishProgressReporter for StderrProgress {
    fn report(&self, event: PublishProgressEvent) {
        let line = match &event {
            PublishProgressEvent::Scanned { files, notes } => format!(
                "vpub  scanned  {} files, {} notes\n",
                format_number(*files),
                format_number(*notes)
            ),
            PublishProgressEvent::Comparing {
                notes,
                remote_files,
            } => format!(
                "vpub  comparing  {} marked notes against {} remote files\n",
                format_number(*notes),
                format_number(*remote_files)
            ),
            PublishProgressEvent::Uploading { files, assets } => format!(
                "vpub  uploading  {} files, {} assets\n",
                format_number(*files),
                format_number(*assets)
            ),
            PublishProgressEvent::Deleting { files } => {
                format!("vpub  deleting  {} files\n", format_number(*files))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl PublishProgressReporter for JsonProgress {
    fn report(&self, event: PublishProgressEvent) {
        let obj = match &event {
            PublishProgressEvent::Scanned { files, notes } => serde_json::json!({
                "event": "progress",
                "phase": "scanned",
                "files": files,
                "notes": notes
            }),
            PublishProgressEvent::Comparing {
                notes,
                remote_files,
            } => serde_json::json!({
                "event": "progress",
                "phase": "comparing",
                "notes": notes,
                "remote_files": remote_files
            }),
            PublishProgressEvent::Uploading { files, assets } => serde_json::json!({
                "event": "progress",
                "phase": "uploading",
                "files": files,
                "assets": assets
            }),
            PublishProgressEvent::Deleting { files } => serde_json::json!({
                "event": "progress",
                "phase": "deleting",
                "files": files
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl PublishProgressReporter for NoProgress {
    fn report(&self, _event: PublishProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn PublishProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
