//! Session Supervision Module
//!
//! Owns the table of live agent sessions and their child processes:
//! - Lock-free concurrent session table (DashMap)
//! - One child process per session, exclusively owned
//! - Incremental output streaming to an abstract event sink
//! - Graceful abort with single-shot terminal notification

pub mod events;
pub mod manager;
pub mod state;

pub use events::{EventSink, SessionEvent};
pub use manager::{SessionSupervisor, SupervisorError};
pub use state::{ActiveSession, SessionInfo, SessionOutcome, SessionStatus, StartOptions};
