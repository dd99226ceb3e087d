//! Launch Policies
//!
//! Per-tool launch configuration: how a free-form prompt becomes an
//! executable name, argument list, and environment for one of the
//! interchangeable agent CLIs. Policies are static data; the supervisor
//! holds a table of them keyed by tool name.

use std::collections::HashMap;

/// Builds the argument list for a prompt. Pure function, no shared state.
pub type ArgBuilder = fn(&str) -> Vec<String>;

/// Static launch configuration for one agent CLI.
#[derive(Debug, Clone)]
pub struct LaunchPolicy {
    /// Executable name, resolved through PATH at spawn time.
    pub program: String,
    /// Maps prompt text to the ordered argument list.
    pub build_args: ArgBuilder,
    /// Environment overrides layered on the inherited parent environment.
    pub env: Vec<(String, String)>,
    /// Forward diagnostic-stream chunks to the sink instead of only logging
    /// them. Off for every builtin policy.
    pub forward_stderr: bool,
}

impl LaunchPolicy {
    /// Create a policy with a bare prompt-as-single-argument convention.
    pub fn new(program: impl Into<String>, build_args: ArgBuilder) -> Self {
        Self {
            program: program.into(),
            build_args,
            env: Vec::new(),
            forward_stderr: false,
        }
    }

    /// Add an environment override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Forward stderr chunks to the sink as content deltas.
    pub fn with_stderr_forwarding(mut self) -> Self {
        self.forward_stderr = true;
        self
    }

    /// Crush CLI: `crush [prompt]`. Crush is a TUI, so CI=true is forced to
    /// keep its output non-interactive.
    pub fn crush() -> Self {
        Self::new("crush", |prompt| {
            if prompt.trim().is_empty() {
                vec![]
            } else {
                vec![prompt.to_string()]
            }
        })
        .with_env("CI", "true")
    }

    /// iFlow CLI: `iflow -p "prompt"`.
    pub fn iflow() -> Self {
        Self::new("iflow", |prompt| {
            if prompt.trim().is_empty() {
                vec![]
            } else {
                vec!["-p".to_string(), prompt.to_string()]
            }
        })
    }

    /// OpenCode CLI: `opencode run "prompt"`.
    pub fn opencode() -> Self {
        Self::new("opencode", |prompt| {
            if prompt.trim().is_empty() {
                vec!["run".to_string()]
            } else {
                vec!["run".to_string(), prompt.to_string()]
            }
        })
    }

    /// The default variant table, keyed by tool name.
    pub fn builtin() -> HashMap<String, LaunchPolicy> {
        let mut policies = HashMap::new();
        policies.insert("crush".to_string(), Self::crush());
        policies.insert("iflow".to_string(), Self::iflow());
        policies.insert("opencode".to_string(), Self::opencode());
        policies
    }
}
