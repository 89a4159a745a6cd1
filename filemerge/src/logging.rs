//! Structured event reporting.
//!
//! The library never installs a global logger. Mergers and the orchestrator
//! report what they do through an [`EventSink`] handed to them at
//! construction; front ends choose where the events go. [`LogSink`] forwards
//! to the `log` facade, which is what the CLI uses together with
//! `simplelog`.

use log::Level;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Phase of a merge request an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Type detection and input validation.
    Validate,
    /// Read-only preview.
    Preview,
    /// Copying pages or sheets.
    Merge,
    /// Writing the output file.
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validate => "validate",
            Self::Preview => "preview",
            Self::Merge => "merge",
            Self::Write => "write",
        })
    }
}

/// One structured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeEvent {
    /// Severity.
    pub level: Level,
    /// Phase the event was raised in.
    pub stage: Stage,
    /// Input or output file the event concerns.
    pub path: Option<PathBuf>,
    /// Message text.
    pub message: String,
}

impl fmt::Display for MergeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.stage, path.display(), self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

/// Receiver of merge events.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: MergeEvent);
}

/// Sink shared between the orchestrator, the mergers and worker threads.
pub type SharedSink = Arc<dyn EventSink>;

impl dyn EventSink {
    fn emit(&self, level: Level, stage: Stage, path: Option<&Path>, message: String) {
        self.record(MergeEvent {
            level,
            stage,
            path: path.map(Path::to_path_buf),
            message,
        });
    }

    /// Record an info event.
    pub fn info(&self, stage: Stage, path: Option<&Path>, message: impl Into<String>) {
        self.emit(Level::Info, stage, path, message.into());
    }

    /// Record a debug event.
    pub fn debug(&self, stage: Stage, path: Option<&Path>, message: impl Into<String>) {
        self.emit(Level::Debug, stage, path, message.into());
    }

    /// Record a warning.
    pub fn warn(&self, stage: Stage, path: Option<&Path>, message: impl Into<String>) {
        self.emit(Level::Warn, stage, path, message.into());
    }

    /// Record an error.
    pub fn error(&self, stage: Stage, path: Option<&Path>, message: impl Into<String>) {
        self.emit(Level::Error, stage, path, message.into());
    }
}

/// Forwards events to the `log` facade under the `filemerge` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: MergeEvent) {
        log::log!(target: "filemerge", event.level, "{event}");
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<MergeEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<MergeEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Recorded events at `level` or more severe.
    pub fn at_least(&self, level: Level) -> Vec<MergeEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level <= level)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: MergeEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: MergeEvent) {}
}

/// Default sink used when none is given.
pub fn default_sink() -> SharedSink {
    Arc::new(LogSink)
}
