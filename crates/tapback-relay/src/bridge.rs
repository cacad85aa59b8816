//! Process bridge to the terminal multiplexer.
//!
//! Every operation is a single one-shot invocation of the multiplexer
//! binary, bounded by a timeout. Failures never cross this boundary: they
//! degrade to an empty list, an empty string, `None` or `false`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tapback_config::TmuxConfig;
use tokio::process::Command;

/// Operations the relay needs from the terminal multiplexer.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Names of all live sessions. Empty on any failure.
    async fn list_sessions(&self) -> Vec<String>;

    /// Most recent lines of the session's pane. Empty means "no output yet".
    async fn capture_pane(&self, session: &str) -> String;

    /// Type `text` literally into the session, then press Enter.
    async fn send_keys(&self, session: &str, text: &str);

    /// Working directory of the session's active pane.
    async fn current_directory(&self, session: &str) -> Option<String>;

    /// Start a detached session in `directory`.
    async fn create_session(&self, name: &str, directory: &str) -> bool;

    async fn kill_session(&self, name: &str);
}

/// [`Multiplexer`] backed by the `tmux` command line.
#[derive(Debug, Clone)]
pub struct TmuxBridge {
    program: String,
    capture_lines: u32,
    timeout: Duration,
}

impl TmuxBridge {
    pub fn new(config: &TmuxConfig) -> Self {
        Self {
            program: config.program.clone(),
            capture_lines: config.capture_lines,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Run one invocation and return its stdout if it exited successfully.
    async fn run(&self, args: &[&str]) -> Option<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Ok(output)) => {
                tracing::debug!(
                    command = args.first().copied().unwrap_or_default(),
                    status = %output.status,
                    "tmux exited with failure"
                );
                None
            }
            Ok(Err(e)) => {
                tracing::debug!(program = %self.program, error = %e, "Failed to spawn tmux");
                None
            }
            Err(_) => {
                tracing::warn!(
                    command = args.first().copied().unwrap_or_default(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "tmux invocation timed out"
                );
                None
            }
        }
    }
}

#[async_trait]
impl Multiplexer for TmuxBridge {
    async fn list_sessions(&self) -> Vec<String> {
        self.run(&["list-sessions", "-F", "#{session_name}"])
            .await
            .map(|out| parse_session_list(&out))
            .unwrap_or_default()
    }

    async fn capture_pane(&self, session: &str) -> String {
        let start = format!("-{}", self.capture_lines);
        self.run(&["capture-pane", "-t", session, "-p", "-S", &start])
            .await
            .unwrap_or_default()
    }

    async fn send_keys(&self, session: &str, text: &str) {
        if !text.is_empty() {
            self.run(&["send-keys", "-t", session, "-l", "--", text]).await;
        }
        self.run(&["send-keys", "-t", session, "Enter"]).await;
    }

    async fn current_directory(&self, session: &str) -> Option<String> {
        let out = self
            .run(&["display-message", "-p", "-t", session, "#{pane_current_path}"])
            .await?;
        non_blank(&out)
    }

    async fn create_session(&self, name: &str, directory: &str) -> bool {
        let created = self
            .run(&["new-session", "-d", "-s", name, "-c", directory])
            .await
            .is_some();
        if created {
            tracing::info!(session = %name, directory = %directory, "Created tmux session");
        }
        created
    }

    async fn kill_session(&self, name: &str) {
        if self.run(&["kill-session", "-t", name]).await.is_some() {
            tracing::info!(session = %name, "Killed tmux session");
        }
    }
}

fn parse_session_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn non_blank(output: &str) -> Option<String> {
    let trimmed = output.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
