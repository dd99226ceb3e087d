//! Session State
//!
//! Per-session bookkeeping held in the supervisor's table, plus the
//! serializable snapshots and terminal outcome handed to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Status of a live session. Terminal states never appear here: the table
/// entry is removed in the same step that reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Child process is running.
    Running,
    /// Abort is in flight: the kill signal has been sent and the exit path
    /// will remove the entry and suppress the completion event.
    Terminating,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Terminating => write!(f, "terminating"),
        }
    }
}

/// One entry in the supervisor's session table. Owns the kill switch for
/// its child process; the child handle itself stays with the `start` task.
#[derive(Debug)]
pub struct ActiveSession {
    /// Unique session identifier
    pub id: String,
    /// Child process ID
    pub pid: Option<u32>,
    /// Working directory resolved at start, immutable for the session
    pub working_dir: PathBuf,
    /// When the child was spawned
    pub started_at: DateTime<Utc>,
    /// Current status
    pub status: SessionStatus,
    /// Kill switch sender - send to request graceful termination
    pub kill_tx: Option<oneshot::Sender<()>>,
}

impl ActiveSession {
    /// Create a new table entry for a freshly spawned child.
    pub fn new(
        id: impl Into<String>,
        pid: Option<u32>,
        working_dir: PathBuf,
        kill_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id: id.into(),
            pid,
            working_dir,
            started_at: Utc::now(),
            status: SessionStatus::Running,
            kill_tx: Some(kill_tx),
        }
    }

    /// Fire the kill switch and mark the abort as in flight.
    ///
    /// Idempotent: a second call finds the switch already taken and only
    /// re-confirms the terminating status.
    pub fn request_abort(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
        self.status = SessionStatus::Terminating;
    }

    /// Whether abort has been requested for this session.
    pub fn abort_in_flight(&self) -> bool {
        self.status == SessionStatus::Terminating
    }
}

/// Serializable session snapshot for introspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub pid: Option<u32>,
    pub working_dir: PathBuf,
    pub status: SessionStatus,
    pub started_at: String,
}

impl From<&ActiveSession> for SessionInfo {
    fn from(session: &ActiveSession) -> Self {
        Self {
            id: session.id.clone(),
            pid: session.pid,
            working_dir: session.working_dir.clone(),
            status: session.status,
            started_at: session.started_at.to_rfc3339(),
        }
    }
}

/// Terminal outcome of a session, returned when `start` resolves.
///
/// A nonzero exit code is a normal outcome, not an error; only spawn
/// failure rejects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// The resolved session key (caller-supplied or generated).
    pub session_id: String,
    /// Process exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// True when the caller supplied no prior session id.
    pub is_new_session: bool,
    /// True when the session ended via `abort` rather than natural exit.
    pub aborted: bool,
    /// Wall-clock session duration in milliseconds.
    pub duration_ms: u64,
}

/// Caller-supplied options for `start`.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Resume an existing conversation under this key; `None` generates a
    /// fresh key.
    pub session_id: Option<String>,
    /// Working directory for the child; defaults to the supervisor's own
    /// process working directory.
    pub working_dir: Option<PathBuf>,
}
