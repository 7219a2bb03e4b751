use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use super::{Target, TmuxSession, TmuxWindow};
use crate::config::TmuxSettings;
use crate::error::{CrewError, Result};

/// Name of the paste buffer used for multi-line input.
const PASTE_BUFFER: &str = "tmux-crew";

const WINDOW_FORMAT: &str = "#{session_name}|#{window_index}|#{window_name}|#{window_active}";
const SESSION_FORMAT: &str =
    "#{session_name}|#{session_created}|#{session_attached}|#{session_windows}";

/// The multiplexer operations the orchestrator relies on.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    async fn has_session(&self, name: &str) -> Result<bool>;
    async fn list_sessions(&self) -> Result<Vec<TmuxSession>>;
    async fn list_windows(&self, session: &str) -> Result<Vec<TmuxWindow>>;
    /// Create a detached session whose first window is called `window_name`.
    async fn new_session(&self, name: &str, window_name: &str, cwd: &Path) -> Result<TmuxWindow>;
    async fn new_window(&self, session: &str, name: &str, cwd: &Path) -> Result<TmuxWindow>;
    /// Send key names such as `Enter` or `C-c`.
    async fn send_keys(&self, target: &Target, keys: &str) -> Result<()>;
    /// Type text literally, without key-name lookup.
    async fn send_literal(&self, target: &Target, text: &str) -> Result<()>;
    /// Paste text through a tmux buffer using bracketed paste.
    async fn paste_text(&self, target: &Target, text: &str) -> Result<()>;
    async fn capture_pane(&self, target: &Target) -> Result<String>;
    async fn kill_session(&self, name: &str) -> Result<()>;
    async fn kill_window(&self, target: &Target) -> Result<()>;
}

/// Client for interacting with tmux via CLI
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
    /// Upper bound for each tmux invocation
    timeout: Duration,
}

impl TmuxClient {
    pub fn new() -> Self {
        Self::from_settings(&TmuxSettings::default())
    }

    pub fn from_settings(settings: &TmuxSettings) -> Self {
        Self {
            tmux_path: settings.binary.clone(),
            timeout: Duration::from_millis(settings.command_timeout_ms),
        }
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new(&self.tmux_path);
        cmd.args(args).kill_on_drop(true);

        let subcommand = args.first().copied().unwrap_or_default();
        tracing::trace!(?args, "running tmux");
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CrewError::Timeout(format!("tmux {}", subcommand))),
        }
    }

    /// Run tmux and return stdout, failing on a non-zero exit.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            let subcommand = args.first().copied().unwrap_or_default();
            return Err(CrewError::tmux(subcommand, &output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Get the command to attach to a session (for external execution)
    pub fn attach_command(&self, session: &str) -> Vec<String> {
        vec![
            self.tmux_path.clone(),
            "attach-session".to_string(),
            "-t".to_string(),
            session.to_string(),
        ]
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}

fn no_server(stderr: &str) -> bool {
    stderr.contains("no server running")
        || stderr.contains("no sessions")
        || stderr.contains("error connecting to")
}

pub(crate) fn parse_session_line(line: &str) -> Option<TmuxSession> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 4 {
        return None;
    }

    Some(TmuxSession {
        name: parts[0].to_string(),
        created_at: parts[1].parse().unwrap_or(0),
        attached_clients: parts[2].parse().unwrap_or(0),
        windows: parts[3].parse().unwrap_or(0),
    })
}

pub(crate) fn parse_window_line(line: &str) -> Option<TmuxWindow> {
    // Window names may contain '|', so split from both ends.
    let (session, rest) = line.split_once('|')?;
    let (index, rest) = rest.split_once('|')?;
    let (name, active) = rest.rsplit_once('|')?;

    Some(TmuxWindow {
        session: session.to_string(),
        index: index.parse().ok()?,
        name: name.to_string(),
        active: active.trim() == "1",
    })
}

#[async_trait]
impl Multiplexer for TmuxClient {
    async fn has_session(&self, name: &str) -> Result<bool> {
        // `=` forces an exact match instead of tmux's prefix matching.
        let exact = format!("={}", name);
        let output = self.output(&["has-session", "-t", &exact]).await?;
        Ok(output.status.success())
    }

    /// List all tmux sessions
    async fn list_sessions(&self) -> Result<Vec<TmuxSession>> {
        let output = self.output(&["list-sessions", "-F", SESSION_FORMAT]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if no_server(&stderr) {
                return Ok(Vec::new());
            }
            return Err(CrewError::tmux("list-sessions", &output.stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_session_line).collect())
    }

    async fn list_windows(&self, session: &str) -> Result<Vec<TmuxWindow>> {
        let exact = format!("={}", session);
        let output = self
            .output(&["list-windows", "-t", &exact, "-F", WINDOW_FORMAT])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if no_server(&stderr) || stderr.contains("can't find session") {
                return Err(CrewError::SessionNotFound(session.to_string()));
            }
            return Err(CrewError::tmux("list-windows", &output.stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_window_line).collect())
    }

    async fn new_session(&self, name: &str, window_name: &str, cwd: &Path) -> Result<TmuxWindow> {
        let cwd = cwd.to_string_lossy();
        let stdout = self
            .run(&[
                "new-session", "-d", "-P", "-F", WINDOW_FORMAT, "-s", name, "-n", window_name,
                "-c", &cwd, "-x", "220", "-y", "50",
            ])
            .await?;

        tracing::info!(session = name, window = window_name, "tmux session created");
        stdout
            .lines()
            .find_map(parse_window_line)
            .ok_or_else(|| CrewError::tmux("new-session", "session created but not reported"))
    }

    async fn new_window(&self, session: &str, name: &str, cwd: &Path) -> Result<TmuxWindow> {
        let cwd = cwd.to_string_lossy();
        // Trailing ':' lets tmux pick the next free index in that session.
        let target = format!("={}:", session);
        let stdout = self
            .run(&[
                "new-window", "-d", "-P", "-F", WINDOW_FORMAT, "-t", &target, "-n", name, "-c",
                &cwd,
            ])
            .await?;

        tracing::info!(session, window = name, "tmux window created");
        stdout
            .lines()
            .find_map(parse_window_line)
            .ok_or_else(|| CrewError::tmux("new-window", "window created but not reported"))
    }

    async fn send_keys(&self, target: &Target, keys: &str) -> Result<()> {
        let target = target.to_string();
        self.run(&["send-keys", "-t", &target, keys]).await?;
        tracing::debug!(target = %target, keys, "sent keys");
        Ok(())
    }

    async fn send_literal(&self, target: &Target, text: &str) -> Result<()> {
        let target = target.to_string();
        self.run(&["send-keys", "-t", &target, "-l", "--", text]).await?;
        tracing::debug!(target = %target, bytes = text.len(), "typed text");
        Ok(())
    }

    async fn paste_text(&self, target: &Target, text: &str) -> Result<()> {
        let target = target.to_string();
        self.run(&["set-buffer", "-b", PASTE_BUFFER, "--", text]).await?;
        self.run(&["paste-buffer", "-d", "-p", "-b", PASTE_BUFFER, "-t", &target])
            .await?;
        tracing::debug!(target = %target, bytes = text.len(), "pasted text");
        Ok(())
    }

    async fn capture_pane(&self, target: &Target) -> Result<String> {
        let target = target.to_string();
        self.run(&["capture-pane", "-p", "-J", "-t", &target]).await
    }

    /// Kill a session
    async fn kill_session(&self, name: &str) -> Result<()> {
        let exact = format!("={}", name);
        self.run(&["kill-session", "-t", &exact]).await?;
        tracing::info!(session = name, "tmux session killed");
        Ok(())
    }

    async fn kill_window(&self, target: &Target) -> Result<()> {
        let target = target.to_string();
        self.run(&["kill-window", "-t", &target]).await?;
        tracing::info!(target = %target, "tmux window killed");
        Ok(())
    }
}
