//! Run a snapshot on a dedicated thread and stream its events.
//!
//! The worker thread owns the pipeline (and with it the browser and the
//! document tree), so nothing it holds needs to be `Send`. Callers consume
//! events from a [`SnapshotHandle`] either synchronously or from async code.

use crate::events::{Completion, ProgressSink, SnapshotEvent};
use crate::{Result, SnapshotConfig, SnapshotPipeline, SnapshotRequest};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, UnboundedReceiver};

const THREAD_NAME: &str = "sitesnap-worker";

/// Receiving end of a running snapshot.
///
/// The stream always ends with exactly one [`SnapshotEvent::Complete`], even
/// when the worker could not be started or died mid-run.
pub struct SnapshotHandle {
    events: UnboundedReceiver<SnapshotEvent>,
    thread: Option<JoinHandle<()>>,
    finished: bool,
}

/// Start a snapshot of `request` with the pipeline described by `config`.
pub fn spawn(request: SnapshotRequest, config: SnapshotConfig) -> SnapshotHandle {
    spawn_with(request, move || SnapshotPipeline::from_config(&config))
}

/// Start a snapshot with a pipeline built on the worker thread by `factory`.
pub fn spawn_with<F>(request: SnapshotRequest, factory: F) -> SnapshotHandle
where
    F: FnOnce() -> Result<SnapshotPipeline> + Send + 'static,
{
    let (tx, events) = mpsc::unbounded_channel();
    let mut fallback = tx.clone();

    let spawned = thread::Builder::new().name(THREAD_NAME.to_string()).spawn(move || {
        let mut sink = tx;
        match factory() {
            Ok(mut pipeline) => {
                pipeline.run(&request, &mut sink);
            }
            Err(e) => {
                log::warn!("could not set up snapshot of {}: {}", request.url(), e);
                sink.on_complete(&Completion::failure(&e));
            }
        }
    });

    let thread = match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("failed to start {}: {}", THREAD_NAME, e);
            fallback.on_complete(&Completion::failure(format!("could not start worker: {}", e)));
            None
        }
    };

    SnapshotHandle {
        events,
        thread,
        finished: false,
    }
}

impl SnapshotHandle {
    /// Next event, blocking the current thread. `None` once the completion has
    /// been returned.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`next`](SnapshotHandle::next) there.
    pub fn blocking_next(&mut self) -> Option<SnapshotEvent> {
        if self.finished {
            return None;
        }
        let event = match self.events.blocking_recv() {
            Some(event) => event,
            None => self.abandoned(),
        };
        Some(self.observe(event))
    }

    /// Next event. `None` once the completion has been returned.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        if self.finished {
            return None;
        }
        let event = match self.events.recv().await {
            Some(event) => event,
            None => self.abandoned(),
        };
        Some(self.observe(event))
    }

    /// Drain the remaining events and return the completion.
    pub fn wait(mut self) -> Completion {
        while let Some(event) = self.blocking_next() {
            if let SnapshotEvent::Complete(completion) = event {
                return completion;
            }
        }
        Completion::failure("snapshot already completed")
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn observe(&mut self, event: SnapshotEvent) -> SnapshotEvent {
        if event.is_terminal() {
            self.finished = true;
            self.join();
        }
        event
    }

    /// The channel closed without a completion: the worker panicked.
    fn abandoned(&mut self) -> SnapshotEvent {
        let reason = match self.join() {
            Some(panic) => format!("snapshot worker panicked: {}", panic),
            None => "snapshot worker stopped before completing".to_string(),
        };
        log::warn!("{}", reason);
        SnapshotEvent::Complete(Completion::failure(reason))
    }

    /// Join the worker, returning its panic message if it panicked.
    fn join(&mut self) -> Option<String> {
        let payload = self.thread.take()?.join().err()?;
        Some(
            payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string()),
        )
    }
}
