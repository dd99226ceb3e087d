//! Output Normalization
//!
//! Cleans raw chunks read from an agent's output streams before they are
//! forwarded as events. The agent CLIs are TUI-oriented and decorate their
//! output with ANSI escapes; the remote client expects plain text.

use regex::Regex;
use std::sync::LazyLock;

/// ANSI CSI sequences: ESC '[' then parameter bytes, then a final letter.
static ANSI_CSI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\x1b\\[[0-9;?]*[A-Za-z]").expect("valid ANSI pattern"));

/// Normalize one raw output chunk.
///
/// Strips ANSI CSI sequences (cursor movement, color/style) and every
/// non-printable control character except tab, newline, and carriage
/// return. Idempotent: an already-clean string is returned unchanged.
pub fn normalize_chunk(raw: &str) -> String {
    let stripped = ANSI_CSI.replace_all(raw, "");
    stripped
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// Whether a normalized chunk carries anything worth forwarding.
///
/// Chunks that normalize to nothing (or to pure whitespace) are suppressed;
/// no event is emitted for them.
pub fn is_displayable(normalized: &str) -> bool {
    !normalized.trim().is_empty()
}
