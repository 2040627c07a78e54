//! Output redirection
//!
//! The engine reports progress through plain synchronous writes. The
//! [`OutputRedirector`] buffers those writes per session, so a request can
//! collect them afterwards, and forwards each one to a [`PushSink`] as it
//! happens so connected clients see output while a turn is still running.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{trace, warn};

use crate::session::SessionId;

/// Kind of pushed output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushKind {
    ToolOutput,
    ToolError,
    ToolWarning,
}

/// Event delivered to push channel listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub kind: PushKind,
    pub session_id: SessionId,
    pub output: String,
}

impl PushEvent {
    pub fn tool_output(session_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            kind: PushKind::ToolOutput,
            session_id: session_id.into(),
            output: output.into(),
        }
    }
}

/// Destination for pushed output.
///
/// `emit` is called inline from the engine's write path and must not block.
pub trait PushSink: Send + Sync {
    fn emit(&self, event: PushEvent);
}

impl PushSink for broadcast::Sender<PushEvent> {
    fn emit(&self, event: PushEvent) {
        // No listeners connected is not an error for a broadcast
        if self.send(event).is_err() {
            trace!("No push listeners connected");
        }
    }
}

impl PushSink for mpsc::Sender<PushEvent> {
    fn emit(&self, event: PushEvent) {
        match self.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(session_id = %event.session_id, "Push channel full, dropping output");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("Push channel closed");
            }
        }
    }
}

/// Per-session output buffer with optional push forwarding
pub struct OutputRedirector {
    session_id: SessionId,
    buffer: Mutex<Vec<String>>,
    sink: Option<Arc<dyn PushSink>>,
}

impl OutputRedirector {
    pub fn new(session_id: impl Into<String>, sink: Option<Arc<dyn PushSink>>) -> Self {
        Self {
            session_id: session_id.into(),
            buffer: Mutex::new(Vec::new()),
            sink,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record engine output and forward it to the push sink
    pub fn write(&self, text: impl Into<String>) {
        self.record(PushKind::ToolOutput, text.into());
    }

    /// Record an engine error message
    pub fn tool_error(&self, text: impl Into<String>) {
        self.record(PushKind::ToolError, text.into());
    }

    /// Record an engine warning
    pub fn tool_warning(&self, text: impl Into<String>) {
        self.record(PushKind::ToolWarning, text.into());
    }

    fn record(&self, kind: PushKind, text: String) {
        // Buffer lock is released before the sink runs
        self.buffer.lock().push(text.clone());

        if let Some(sink) = &self.sink {
            sink.emit(PushEvent {
                kind,
                session_id: self.session_id.clone(),
                output: text,
            });
        }
    }

    /// Join buffered output with newlines and clear the buffer
    pub fn drain_buffer(&self) -> String {
        let lines = std::mem::take(&mut *self.buffer.lock());
        lines.join("\n")
    }

    /// Number of buffered writes
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Interactive input is never available on this channel
    pub fn read_input(&self, prompt: Option<&str>) -> Option<String> {
        trace!(session_id = %self.session_id, ?prompt, "Input requested, none available");
        None
    }

    /// Confirmation prompts are always declined
    pub fn confirm(&self, question: &str) -> bool {
        trace!(session_id = %self.session_id, question, "Confirmation requested, declining");
        false
    }
}

impl std::fmt::Debug for OutputRedirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputRedirector")
            .field("session_id", &self.session_id)
            .field("pending", &self.pending())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
