//! Multiplexer invocation, poll cadence and status retention.

use serde::{Deserialize, Serialize};

/// How the relay invokes the terminal multiplexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmuxConfig {
    /// Multiplexer program, resolved through `$PATH`.
    pub program: String,
    /// Lines of scrollback captured per pane (valid range: 1-10000).
    pub capture_lines: u32,
    /// Upper bound for a single invocation in milliseconds (valid range: 100-60000).
    pub timeout_ms: u64,
    /// Directory new sessions start in. Empty means the home directory.
    pub default_directory: String,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            program: "tmux".into(),
            capture_lines: 300,
            timeout_ms: 5000,
            default_directory: String::new(),
        }
    }
}

/// Viewer broadcast cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Interval between session polls in milliseconds (valid range: 100-60000).
    pub poll_interval_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

/// Status store retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Records older than this many seconds are evicted on the next write.
    pub retention_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
        }
    }
}
