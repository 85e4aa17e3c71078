//! Ordered progress events streamed to the caller while a turn runs
//!
//! One channel per turn. The stream is finite: it ends once the emitter is
//! dropped, which the turn loop does right after the terminal `Final` or
//! `Error` event. There is a single consumer and no replay.

use crate::intent::Persona;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

const DETECTED_PREFIX: &str = "🤖 Detected ";
const DETECTED_SUFFIX: &str = " agent...";
const INVOKING_PREFIX: &str = "⚙️ ";
const INVOKING_INFIX: &str = " agent invoking ";
const INVOKING_SUFFIX: &str = "…";
const COMPLETED_PREFIX: &str = "✅ ";
const COMPLETED_SUFFIX: &str = " agent finished reasoning.";
const ERROR_PREFIX: &str = "⚠️ Error: ";

/// Leading markers reserved for status lines
pub const STATUS_MARKERS: &[&str] = &[
    "📍", "🌦️", "💰", "💱", "🗺️", "🛫", "🌐", "🧩", "⏱️", "⚠️ Missing", "⚠️ Unknown",
];

/// A unit of turn progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Classification finished
    Detected { persona: Persona },
    /// A tool call is about to be dispatched
    ToolInvoked { persona: Persona, tool: String },
    /// Free-form status line (per-tool status, notices, synthesis)
    Status { message: String },
    /// The model is done; the answer follows
    Completed { persona: Persona },
    /// Incremental piece of the answer (streamed synthesis only)
    AnswerDelta { text: String },
    /// Final answer, terminal
    Final { text: String },
    /// Turn failed, terminal
    Error { message: String },
}

impl ProgressEvent {
    pub fn status(message: impl Into<String>) -> Self {
        ProgressEvent::Status {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Final { .. } | ProgressEvent::Error { .. })
    }

    /// Prefix-tagged plain string, as older clients expect
    pub fn to_wire(&self) -> String {
        match self {
            ProgressEvent::Detected { persona } => {
                format!("{DETECTED_PREFIX}{persona}{DETECTED_SUFFIX}")
            }
            ProgressEvent::ToolInvoked { persona, tool } => {
                format!("{INVOKING_PREFIX}{persona}{INVOKING_INFIX}{tool}{INVOKING_SUFFIX}")
            }
            ProgressEvent::Status { message } => message.clone(),
            ProgressEvent::Completed { persona } => {
                format!("{COMPLETED_PREFIX}{persona}{COMPLETED_SUFFIX}")
            }
            ProgressEvent::AnswerDelta { text } | ProgressEvent::Final { text } => text.clone(),
            ProgressEvent::Error { message } => format!("{ERROR_PREFIX}{message}"),
        }
    }

    /// Classify a wire string by its reserved leading marker.
    ///
    /// Anything without a marker is answer content and parses as `Final`.
    pub fn from_wire(line: &str) -> ProgressEvent {
        if let Some(persona) = line
            .strip_prefix(DETECTED_PREFIX)
            .and_then(|rest| rest.strip_suffix(DETECTED_SUFFIX))
            .and_then(Persona::from_display_name)
        {
            return ProgressEvent::Detected { persona };
        }

        if let Some((persona, tool)) = line
            .strip_prefix(INVOKING_PREFIX)
            .and_then(|rest| rest.strip_suffix(INVOKING_SUFFIX))
            .and_then(|rest| rest.split_once(INVOKING_INFIX))
            .and_then(|(p, t)| Persona::from_display_name(p).map(|p| (p, t)))
        {
            return ProgressEvent::ToolInvoked {
                persona,
                tool: tool.to_string(),
            };
        }

        if let Some(persona) = line
            .strip_prefix(COMPLETED_PREFIX)
            .and_then(|rest| rest.strip_suffix(COMPLETED_SUFFIX))
            .and_then(Persona::from_display_name)
        {
            return ProgressEvent::Completed { persona };
        }

        if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
            return ProgressEvent::Error {
                message: message.to_string(),
            };
        }

        if STATUS_MARKERS.iter().any(|m| line.starts_with(m)) {
            return ProgressEvent::status(line);
        }

        ProgressEvent::Final {
            text: line.to_string(),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Create the progress channel for one turn
pub fn channel() -> (ProgressEmitter, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressEmitter { tx },
        ProgressStream {
            inner: UnboundedReceiverStream::new(rx),
        },
    )
}

/// Sending half, owned by the turn loop
#[derive(Debug)]
pub struct ProgressEmitter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressEmitter {
    /// Emitter whose events go nowhere, for callers that only want the answer
    pub fn discard() -> Self {
        channel().0
    }

    /// Push an event. A caller that stopped listening does not affect the turn.
    pub fn emit(&self, event: ProgressEvent) {
        tracing::debug!(event = %event, "progress");
        if self.tx.send(event).is_err() {
            tracing::trace!("progress consumer gone");
        }
    }
}

/// Receiving half, a finite stream of events
#[derive(Debug)]
pub struct ProgressStream {
    inner: UnboundedReceiverStream<ProgressEvent>,
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
