//! Analysis progress reporting.
//!
//! Reports observable progress during `digest analyze` so users see which
//! document is being worked on and how many chunks are left. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use doc_digest_core::process::ChunkOutcome;

/// A single progress event for analysis.
#[derive(Clone, Debug)]
pub enum AnalysisProgressEvent {
    /// Analysis of a document is starting.
    Started { file_id: String, total: u64 },
    /// One chunk has been handled: n out of total.
    Chunk {
        file_id: String,
        n: u64,
        total: u64,
        outcome: ChunkOutcome,
    },
    /// All chunks are processed; the summary is being reduced.
    Reducing { file_id: String },
}

/// Reports analysis progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: AnalysisProgressEvent);
}

/// One stderr line for a human reader, e.g.
/// `analyze doc-1a2b  chunk 12 / 1,500  processed`.
fn human_line(event: &AnalysisProgressEvent) -> String {
    match event {
        AnalysisProgressEvent::Started { file_id, total } => {
            format!("analyze {}  {} chunks", file_id, format_number(*total))
        }
        AnalysisProgressEvent::Chunk {
            file_id,
            n,
            total,
            outcome,
        } => {
            let status = match outcome {
                ChunkOutcome::Skipped { .. } => "skipped".to_string(),
                ChunkOutcome::Processed { .. } => "processed".to_string(),
                ChunkOutcome::Failed { error, .. } => format!("failed: {}", error),
            };
            format!(
                "analyze {}  chunk {} / {}  {}",
                file_id,
                format_number(*n),
                format_number(*total),
                status
            )
        }
        AnalysisProgressEvent::Reducing { file_id } => {
            format!("analyze {}  summarizing...", file_id)
        }
    }
}

fn event_json(event: &AnalysisProgressEvent) -> serde_json::Value {
    match event {
        AnalysisProgressEvent::Started { file_id, total } => serde_json::json!({
            "event": "progress",
            "phase": "started",
            "file_id": file_id,
            "total": total
        }),
        AnalysisProgressEvent::Chunk {
            file_id,
            n,
            total,
            outcome,
        } => serde_json::json!({
            "event": "progress",
            "phase": "chunks",
            "file_id": file_id,
            "n": n,
            "total": total,
            "chunk": outcome
        }),
        AnalysisProgressEvent::Reducing { file_id } => serde_json::json!({
            "event": "progress",
            "phase": "reducing",
            "file_id": file_id
        }),
    }
}

fn write_stderr_line(line: &str) {
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "{}", line);
    let _ = err.flush();
}

pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: AnalysisProgressEvent) {
        write_stderr_line(&human_line(&event));
    }
}

/// One JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: AnalysisProgressEvent) {
        write_stderr_line(&event_json(&event).to_string());
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: AnalysisProgressEvent) {}
}

/// `1234567` -> `1,234,567`.
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::from(&digits[..head]);
    for (i, group) in digits.as_bytes()[head..].chunks(3).enumerate() {
        if head > 0 || i > 0 {
            out.push(',');
        }
        out.extend(group.iter().map(|&b| b as char));
    }
    out
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
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

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
