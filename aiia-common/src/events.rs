//! Progress reporting
//!
//! The pipeline reports through a single [`ProgressSink`] capability. Any
//! front-end adapts its own channel to it: a tokio or std queue, a plain
//! callback, or the [`ProgressBus`] broadcast for several listeners.
//!
//! Line protocol (see [`ProgressEvent::to_line`]):
//! - free-form status strings while scanning, scoring, analyzing and writing
//! - `PIPELINE_COMPLETE` immediately followed by the JSON ProcessingResult
//! - `ERROR: <message>` immediately followed by `PIPELINE_ERROR`

use crate::models::ProcessingResult;
use tokio::sync::{broadcast, mpsc};

/// Completion sentinel; the next event carries the result payload
pub const COMPLETION_SENTINEL: &str = "PIPELINE_COMPLETE";

/// Error sentinel; the previous event carries the `ERROR:` message
pub const ERROR_SENTINEL: &str = "PIPELINE_ERROR";

/// One item on the progress channel
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Human-readable status line
    Status(String),
    /// Completion sentinel
    Complete,
    /// Result payload, always directly after `Complete`
    Result(Box<ProcessingResult>),
    /// Error sentinel, always directly after an `ERROR:` status
    Error,
}

impl ProgressEvent {
    /// Render as a single line of the text protocol
    pub fn to_line(&self) -> String {
        match self {
            ProgressEvent::Status(msg) => msg.clone(),
            ProgressEvent::Complete => COMPLETION_SENTINEL.to_string(),
            ProgressEvent::Result(result) => serde_json::to_string(result)
                .unwrap_or_else(|e| format!("{{\"success\":false,\"error\":\"{}\"}}", e)),
            ProgressEvent::Error => ERROR_SENTINEL.to_string(),
        }
    }
}

/// Destination for pipeline progress
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);

    fn status(&self, message: String) {
        self.emit(ProgressEvent::Status(message));
    }

    /// Emit the completion sentinel and its payload as an adjacent pair
    fn complete(&self, result: ProcessingResult) {
        self.emit(ProgressEvent::Complete);
        self.emit(ProgressEvent::Result(Box::new(result)));
    }

    /// Emit `ERROR: <message>` followed by the error sentinel
    fn error(&self, message: &str) {
        self.emit(ProgressEvent::Status(format!("ERROR: {}", message)));
        self.emit(ProgressEvent::Error);
    }
}

/// Queue adapter (tokio unbounded channel)
///
/// A closed receiver is not a pipeline failure; events are dropped.
impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        if self.send(event).is_err() {
            tracing::trace!("Progress receiver dropped, discarding event");
        }
    }
}

/// Queue adapter (std channel), for callers driving the pipeline from a thread
impl ProgressSink for std::sync::mpsc::Sender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        if self.send(event).is_err() {
            tracing::trace!("Progress receiver dropped, discarding event");
        }
    }
}

/// Callback adapter
pub struct CallbackSink<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressSink for CallbackSink<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        (self.callback)(event);
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Broadcast sink for several concurrent listeners
///
/// Slow subscribers lag and lose the oldest events rather than blocking the
/// pipeline.
#[derive(Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
    capacity: usize,
}

impl ProgressBus {
    /// Create a bus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the case of no subscribers
    pub fn emit_lossy(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl ProgressSink for ProgressBus {
    fn emit(&self, event: ProgressEvent) {
        self.emit_lossy(event);
    }
}
