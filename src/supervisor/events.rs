//! Session Events
//!
//! The outbound event schema delivered to a session's sink, and the sink
//! abstraction itself. The transport that carries events to the remote
//! client (WebSocket, channel, whatever) lives outside this crate; the
//! supervisor only needs "send one structured message".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Events emitted over a session's lifetime.
///
/// Every session's stream is one of:
/// `(ContentDelta)* ContentStop Completed` (natural exit),
/// `(ContentDelta)* ContentStop` (aborted by the caller), or
/// `Error` alone (the child could not be spawned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    /// One normalized chunk of the child's output.
    ContentDelta { session_id: String, text: String },

    /// The output stream is closed; no further deltas will follow.
    ContentStop { session_id: String },

    /// Terminal outcome. `exit_code` is `None` when the child was killed by
    /// a signal. `is_new_session` is true when the caller supplied no prior
    /// session id.
    Completed {
        session_id: String,
        exit_code: Option<i32>,
        is_new_session: bool,
    },

    /// The child could not be spawned. Emitted instead of stop+completed.
    Error { session_id: String, message: String },
}

impl SessionEvent {
    /// Get the session ID from any event
    pub fn session_id(&self) -> &str {
        match self {
            Self::ContentDelta { session_id, .. } => session_id,
            Self::ContentStop { session_id } => session_id,
            Self::Completed { session_id, .. } => session_id,
            Self::Error { session_id, .. } => session_id,
        }
    }

    /// Whether this event terminates the session's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Error { .. })
    }
}

/// Abstract destination for session events.
///
/// Implementations must tolerate being called from multiple reader tasks;
/// delivery failures are logged by the supervisor and never tear down the
/// session.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    async fn send(&self, event: SessionEvent) -> anyhow::Result<()>;
}

/// In-process sink: any unbounded channel of events works directly.
#[async_trait]
impl EventSink for tokio::sync::mpsc::UnboundedSender<SessionEvent> {
    async fn send(&self, event: SessionEvent) -> anyhow::Result<()> {
        tokio::sync::mpsc::UnboundedSender::send(self, event)
            .map_err(|_| anyhow::anyhow!("event receiver dropped"))
    }
}
