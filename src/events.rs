//! Progress, status and completion events
//!
//! The pipeline reports to a [`ProgressSink`]. A sink can be a channel
//! feeding a UI thread, a `Vec` collecting events for later inspection, or
//! any caller-provided type.

use crate::archive::SnapshotArtifact;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

/// Terminal outcome of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// Human-readable summary, prefixed with `Error:` on failure
    pub message: String,
    /// Absolute snapshot directory; `None` when nothing durable was produced
    pub artifact: Option<PathBuf>,
}

impl Completion {
    pub fn success(artifact: &SnapshotArtifact) -> Self {
        Self {
            message: format!("Finished: {}", artifact.file.display()),
            artifact: Some(artifact.directory.clone()),
        }
    }

    pub fn failure(err: impl std::fmt::Display) -> Self {
        Self {
            message: format!("Error: {}", err),
            artifact: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.artifact.is_some()
    }
}

/// Events observed by a front-end, in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SnapshotEvent {
    Progress { percent: u8 },
    Status { message: String },
    Complete(Completion),
}

impl SnapshotEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SnapshotEvent::Complete(_))
    }
}

/// Receiver of pipeline notifications
pub trait ProgressSink {
    fn on_progress(&mut self, percent: u8);
    fn on_status(&mut self, message: &str);
    fn on_complete(&mut self, completion: &Completion);
}

impl ProgressSink for Vec<SnapshotEvent> {
    fn on_progress(&mut self, percent: u8) {
        self.push(SnapshotEvent::Progress { percent });
    }

    fn on_status(&mut self, message: &str) {
        self.push(SnapshotEvent::Status {
            message: message.to_string(),
        });
    }

    fn on_complete(&mut self, completion: &Completion) {
        self.push(SnapshotEvent::Complete(completion.clone()));
    }
}

// A closed receiver means nobody is listening any more; the run still finishes.
impl ProgressSink for UnboundedSender<SnapshotEvent> {
    fn on_progress(&mut self, percent: u8) {
        let _ = self.send(SnapshotEvent::Progress { percent });
    }

    fn on_status(&mut self, message: &str) {
        let _ = self.send(SnapshotEvent::Status {
            message: message.to_string(),
        });
    }

    fn on_complete(&mut self, completion: &Completion) {
        let _ = self.send(SnapshotEvent::Complete(completion.clone()));
    }
}

/// Per-run wrapper that keeps progress non-decreasing and within 0–100.
///
/// Every call is forwarded, including repeats of the previous value.
///
/// [`complete`](Emitter::complete) consumes the emitter, so a run can report
/// its outcome only once.
pub(crate) struct Emitter<'s> {
    sink: &'s mut dyn ProgressSink,
    last_percent: u8,
}

impl<'s> Emitter<'s> {
    pub(crate) fn new(sink: &'s mut dyn ProgressSink) -> Self {
        Self {
            sink,
            last_percent: 0,
        }
    }

    pub(crate) fn progress(&mut self, percent: u8) {
        let percent = percent.min(100).max(self.last_percent);
        self.last_percent = percent;
        self.sink.on_progress(percent);
    }

    pub(crate) fn status(&mut self, message: &str) {
        self.sink.on_status(message);
    }

    pub(crate) fn complete(self, completion: &Completion) {
        self.sink.on_complete(completion);
    }
}
