//! Session Supervisor
//!
//! Concurrent session management using DashMap. One supervisor instance
//! owns the table of live child processes; each `start` call runs an agent
//! CLI to completion, streaming normalized output to the caller's sink.
//! Sessions on different keys never block one another.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use super::events::{EventSink, SessionEvent};
use super::state::{ActiveSession, SessionInfo, SessionOutcome, StartOptions};
use crate::launch::LaunchPolicy;
use crate::output::{is_displayable, normalize_chunk};

/// How long an aborted child gets to exit on the graceful signal before it
/// is force-killed.
const GRACEFUL_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read buffer size for the output streams. Each read becomes at most one
/// content delta; chunk boundaries are preserved as they arrive.
const READ_CHUNK_BYTES: usize = 8192;

/// Session supervisor - launches agent CLIs and tracks them by session id
pub struct SessionSupervisor {
    /// Active sessions (session_id -> ActiveSession)
    sessions: Arc<DashMap<String, ActiveSession>>,
    /// Launch policies keyed by tool variant name
    policies: HashMap<String, LaunchPolicy>,
    /// Monotonic counter for generated session ids
    next_id: AtomicU64,
    /// Maximum concurrent sessions allowed
    max_sessions: usize,
}

impl SessionSupervisor {
    /// Create a supervisor with the builtin launch policies.
    pub fn new() -> Self {
        Self::with_policies(LaunchPolicy::builtin())
    }

    /// Create a supervisor with a caller-supplied policy table.
    pub fn with_policies(policies: HashMap<String, LaunchPolicy>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            policies,
            next_id: AtomicU64::new(1),
            max_sessions: 16,
        }
    }

    /// Override the concurrent-session limit.
    pub fn with_limits(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Start a session for a named tool variant.
    ///
    /// Resolves the variant against the policy table and delegates to
    /// [`start_with_policy`](Self::start_with_policy).
    pub async fn start(
        &self,
        tool: &str,
        prompt: &str,
        options: StartOptions,
        sink: Arc<dyn EventSink>,
    ) -> Result<SessionOutcome, SupervisorError> {
        let policy = self
            .policies
            .get(tool)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownVariant(tool.to_string()))?;
        self.start_with_policy(&policy, prompt, options, sink).await
    }

    /// Launch a child process for `prompt` and stream its output until exit.
    ///
    /// Suspends until the child terminates. A nonzero exit code is a normal
    /// outcome carried in the returned [`SessionOutcome`]; only a failure to
    /// spawn rejects. The sink observes `(ContentDelta)* ContentStop
    /// Completed` on natural exit, the same without `Completed` when the
    /// session was aborted, or a single `Error` when the spawn fails.
    pub async fn start_with_policy(
        &self,
        policy: &LaunchPolicy,
        prompt: &str,
        options: StartOptions,
        sink: Arc<dyn EventSink>,
    ) -> Result<SessionOutcome, SupervisorError> {
        let started = Instant::now();

        let args = (policy.build_args)(prompt);
        let working_dir = match options.working_dir {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(SupervisorError::WorkingDir)?,
        };
        let is_new_session = options.session_id.is_none();
        let session_id = match options.session_id {
            Some(id) => id,
            None => self.next_session_id(),
        };

        // Claim the table slot before spawning: the entry API makes the
        // duplicate-id check atomic, and re-checking the capacity under the
        // insert keeps two racing starts from both slipping past the limit.
        let (kill_tx, kill_rx) = oneshot::channel();
        match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(_) => {
                return Err(SupervisorError::SessionExists(session_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(ActiveSession::new(
                    &session_id,
                    None,
                    working_dir.clone(),
                    kill_tx,
                ));
            }
        }
        if self.sessions.len() > self.max_sessions {
            self.sessions.remove(&session_id);
            return Err(SupervisorError::MaxSessionsReached(self.max_sessions));
        }

        info!("Spawning {}: {} {}", session_id, policy.program, args.join(" "));
        debug!("Working directory: {}", working_dir.display());

        let mut cmd = Command::new(&policy.program);
        cmd.args(&args)
            .current_dir(&working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &policy.env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.sessions.remove(&session_id);
                error!("Failed to spawn {}: {}", policy.program, source);
                let event = SessionEvent::Error {
                    session_id: session_id.clone(),
                    message: source.to_string(),
                };
                if let Err(e) = sink.send(event).await {
                    warn!("Session {}: failed to deliver error event: {}", session_id, e);
                }
                return Err(SupervisorError::Spawn {
                    program: policy.program.clone(),
                    source,
                });
            }
        };

        // The entire prompt travels via argv; nothing is ever piped to a
        // running child.
        drop(child.stdin.take());

        let pid = child.id();
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.pid = pid;
        }
        info!("Registered session {} (pid {:?})", session_id, pid);

        let stdout_handle = child
            .stdout
            .take()
            .map(|stream| spawn_reader(stream, session_id.clone(), Arc::clone(&sink), true));
        let stderr_handle = child.stderr.take().map(|stream| {
            spawn_reader(
                stream,
                session_id.clone(),
                Arc::clone(&sink),
                policy.forward_stderr,
            )
        });

        let status = self.wait_for_exit(&mut child, kill_rx, &session_id).await;

        // Drain the readers so every delta precedes the stop marker.
        if let Some(handle) = stdout_handle {
            let _ = handle.await;
        }
        if let Some(handle) = stderr_handle {
            let _ = handle.await;
        }

        // Single removal site: the exit path owns cleanup, whether the child
        // died naturally or on the abort signal.
        let aborted = match self.sessions.remove(&session_id) {
            Some((_, entry)) => entry.abort_in_flight(),
            None => false,
        };

        let exit_code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!("Session {}: wait failed: {}", session_id, e);
                None
            }
        };
        info!("Session {} exited with code {:?}", session_id, exit_code);

        let stop = SessionEvent::ContentStop {
            session_id: session_id.clone(),
        };
        if let Err(e) = sink.send(stop).await {
            warn!("Session {}: failed to deliver stop event: {}", session_id, e);
        }

        // An aborted session already told its caller; emitting the natural
        // completion as well would double-notify.
        if !aborted {
            let completed = SessionEvent::Completed {
                session_id: session_id.clone(),
                exit_code,
                is_new_session,
            };
            if let Err(e) = sink.send(completed).await {
                warn!(
                    "Session {}: failed to deliver completion event: {}",
                    session_id, e
                );
            }
        }

        Ok(SessionOutcome {
            session_id,
            exit_code,
            is_new_session,
            aborted,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Request graceful termination of a session.
    ///
    /// Fires the kill switch and returns without waiting for the child to
    /// die; the exit path removes the table entry and suppresses the
    /// completion event. Returns false for an unknown id (idempotent no-op).
    pub fn abort(&self, session_id: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                info!("Aborting session: {}", session_id);
                session.request_abort();
                true
            }
            None => false,
        }
    }

    /// Whether a session key is currently present in the table.
    pub fn is_active(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Snapshot of the current session keys, unordered.
    pub fn list_active(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.key().clone()).collect()
    }

    /// Number of live sessions.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of one session's bookkeeping.
    pub fn session_info(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions
            .get(session_id)
            .map(|s| SessionInfo::from(s.value()))
    }

    /// Snapshot of every live session.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|s| SessionInfo::from(s.value()))
            .collect()
    }

    /// Abort every live session - for supervisor teardown.
    pub fn shutdown_all(&self) {
        info!("Shutting down all sessions...");
        for mut entry in self.sessions.iter_mut() {
            entry.request_abort();
        }
    }

    /// Generate a fresh session key that cannot collide with any key
    /// currently in the table.
    fn next_session_id(&self) -> String {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    /// Wait for the child to exit naturally, or terminate it when the kill
    /// switch fires.
    async fn wait_for_exit(
        &self,
        child: &mut Child,
        kill_rx: oneshot::Receiver<()>,
        session_id: &str,
    ) -> std::io::Result<ExitStatus> {
        tokio::select! {
            status = child.wait() => status,
            _ = kill_rx => {
                debug!("Session {}: kill switch fired", session_id);
                terminate_gracefully(child).await
            }
        }
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Send the graceful signal, wait out the grace period, then force kill.
async fn terminate_gracefully(child: &mut Child) -> std::io::Result<ExitStatus> {
    send_term_signal(child);
    match tokio::time::timeout(GRACEFUL_EXIT_TIMEOUT, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!("Process ignored termination signal, force killing");
            child.kill().await?;
            child.wait().await
        }
    }
}

#[cfg(unix)]
fn send_term_signal(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SIGTERM, not SIGKILL: give the agent a chance to clean up.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn send_term_signal(child: &mut Child) {
    let _ = child.start_kill();
}

/// Pump one output stream: read raw chunks, normalize, and either forward
/// them to the sink as content deltas or route them to the log.
fn spawn_reader<R>(
    mut stream: R,
    session_id: String,
    sink: Arc<dyn EventSink>,
    forward: bool,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&buf[..n]);
                    let cleaned = normalize_chunk(&text);
                    if !is_displayable(&cleaned) {
                        continue;
                    }
                    if forward {
                        let event = SessionEvent::ContentDelta {
                            session_id: session_id.clone(),
                            text: cleaned,
                        };
                        if let Err(e) = sink.send(event).await {
                            warn!("Session {}: failed to deliver delta: {}", session_id, e);
                        }
                    } else {
                        debug!("Session {} diagnostic: {}", session_id, cleaned.trim_end());
                    }
                }
                Err(e) => {
                    warn!("Session {}: read error: {}", session_id, e);
                    break;
                }
            }
        }
    })
}

/// Supervisor errors
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Unknown tool variant: {0}")]
    UnknownVariant(String),

    #[error("Session already exists: {0}")]
    SessionExists(String),

    #[error("Maximum sessions reached: {0}")]
    MaxSessionsReached(usize),

    #[error("Working directory unavailable: {0}")]
    WorkingDir(#[source] std::io::Error),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<SupervisorError> for String {
    fn from(err: SupervisorError) -> String {
        err.to_string()
    }
}
