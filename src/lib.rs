//! agent-sessions
//!
//! Managed session supervision for interchangeable command-line agents.
//! Given free-form prompt text, the supervisor launches the chosen agent CLI
//! as a child process, streams its normalized output to a caller-supplied
//! event sink, tracks the process by session id for lookup and cancellation,
//! and reports terminal state.
//!
//! The transport that carries events to a remote client, tool selection UI,
//! and process bootstrapping all live outside this crate; callers plug in an
//! [`EventSink`] and a table of [`LaunchPolicy`] values.
//!
//! ```no_run
//! use std::sync::Arc;
//! use agent_sessions::{SessionSupervisor, StartOptions, SessionEvent};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let supervisor = SessionSupervisor::new();
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SessionEvent>();
//!
//! let outcome = supervisor
//!     .start("iflow", "list files", StartOptions::default(), Arc::new(tx))
//!     .await?;
//! println!("session {} exited with {:?}", outcome.session_id, outcome.exit_code);
//! # Ok(())
//! # }
//! ```

pub mod launch;
pub mod output;
pub mod supervisor;

pub use launch::LaunchPolicy;
pub use output::{is_displayable, normalize_chunk};
pub use supervisor::{
    EventSink, SessionEvent, SessionInfo, SessionOutcome, SessionStatus, SessionSupervisor,
    StartOptions, SupervisorError,
};
