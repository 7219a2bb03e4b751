use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker the assistant prints in front of its own turns.
pub const ASSISTANT_MARKER: &str = "Assistant:";
/// Marker in front of the operator's turns.
pub const HUMAN_MARKER: &str = "Human:";

/// Status of an AI agent session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AgentStatus {
    /// Agent is actively processing (spinning, thinking)
    Busy,
    /// Agent is idle, waiting at prompt
    Idle,
    /// Agent is waiting for user input (confirmation, question)
    WaitingForInput,
    /// Agent encountered an error
    Error,
    /// Status cannot be determined
    #[default]
    Unknown,
}

/// Coarse answer to "is anybody home in this window?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Responsiveness {
    /// The assistant spoke last
    Yes,
    /// The assistant is up but waiting on a turn
    Waiting,
    /// No sign of an assistant
    #[default]
    No,
}

impl Responsiveness {
    /// Counts towards the health score
    pub fn is_responsive(self) -> bool {
        !matches!(self, Responsiveness::No)
    }
}

impl fmt::Display for Responsiveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Responsiveness::Yes => "yes",
            Responsiveness::Waiting => "waiting",
            Responsiveness::No => "no",
        })
    }
}

/// Compiled regex patterns for status detection
static RE_WAITING_INPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)(^\s*>\s*$|Type a message|Press Enter|waiting for input|\? $|\[y/n\]|\(y/N\)|\(Y/n\))").unwrap()
});

static RE_BUSY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)(Thinking\.{3}|Processing|Loading|Working|⠋|⠙|⠹|⠸|⠼|⠴|⠦|⠧|⠇|⠏|\.\.\.$)").unwrap()
});

static RE_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)(^Error:|^error:|Exception|FAILED|panic|fatal|crash)").unwrap()
});

static RE_IDLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(^\$\s*$|^❯\s*$|^>\s*$|claude>)").unwrap()
});

/// Last `n` lines of `content`, ignoring trailing blank lines.
///
/// capture-pane pads the visible area with empty rows below the cursor.
pub fn tail(content: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().collect();
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);
    let start = end.saturating_sub(n);
    lines[start..end].to_vec()
}

/// Engine for inferring agent status from pane content
pub struct StateInferenceEngine;

impl StateInferenceEngine {
    /// Analyze pane content and determine agent status
    pub fn analyze(content: &str) -> AgentStatus {
        // Check last ~20 lines for most recent status
        let recent_content = tail(content, 20).join("\n");

        // Priority order: Error > WaitingForInput > Busy > Idle > Unknown
        if RE_ERROR.is_match(&recent_content) {
            return AgentStatus::Error;
        }

        if RE_WAITING_INPUT.is_match(&recent_content) {
            return AgentStatus::WaitingForInput;
        }

        if RE_BUSY.is_match(&recent_content) {
            return AgentStatus::Busy;
        }

        if RE_IDLE.is_match(&recent_content) {
            return AgentStatus::Idle;
        }

        AgentStatus::Unknown
    }

    /// A window is alive when a conversation marker shows in its last `lines` lines.
    pub fn is_alive(content: &str, lines: usize) -> bool {
        tail(content, lines)
            .iter()
            .any(|l| l.contains(ASSISTANT_MARKER) || l.contains(HUMAN_MARKER))
    }

    /// Classify the last `lines` lines into yes / waiting / no.
    pub fn responsiveness(content: &str, lines: usize) -> Responsiveness {
        let recent = tail(content, lines);

        let last_marker = recent.iter().rev().find_map(|l| {
            if l.contains(ASSISTANT_MARKER) {
                Some(Responsiveness::Yes)
            } else if l.contains(HUMAN_MARKER) {
                Some(Responsiveness::Waiting)
            } else {
                None
            }
        });
        if let Some(r) = last_marker {
            return r;
        }

        match Self::analyze(&recent.join("\n")) {
            AgentStatus::WaitingForInput | AgentStatus::Busy => Responsiveness::Waiting,
            _ => Responsiveness::No,
        }
    }
}

/// Everything the monitors derive from one capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaneScan {
    pub status: AgentStatus,
    pub responsiveness: Responsiveness,
    pub alive: bool,
}

impl PaneScan {
    pub fn from_content(content: &str, liveness_lines: usize, responsiveness_lines: usize) -> Self {
        Self {
            status: StateInferenceEngine::analyze(content),
            responsiveness: StateInferenceEngine::responsiveness(content, responsiveness_lines),
            alive: StateInferenceEngine::is_alive(content, liveness_lines),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_waiting_for_input() {
        let content = "Some output\n\n> ";
        assert_eq!(StateInferenceEngine::analyze(content), AgentStatus::WaitingForInput);

        let content = "Do you want to continue? [y/n]";
        assert_eq!(StateInferenceEngine::analyze(content), AgentStatus::WaitingForInput);
    }

    #[test]
    fn test_detect_busy() {
        let content = "Working on the task...\nThinking...";
        assert_eq!(StateInferenceEngine::analyze(content), AgentStatus::Busy);
    }

    #[test]
    fn test_detect_error() {
        let content = "Something went wrong\nError: connection refused";
        assert_eq!(StateInferenceEngine::analyze(content), AgentStatus::Error);
    }

    #[test]
    fn test_detect_idle() {
        let content = "Previous output\n$ ";
        assert_eq!(StateInferenceEngine::analyze(content), AgentStatus::Idle);
    }

    #[test]
    fn test_tail_skips_trailing_blank_rows() {
        let content = "a\nb\nc\n\n   \n\n";
        assert_eq!(tail(content, 2), vec!["b", "c"]);
        assert!(tail("\n\n", 5).is_empty());
        assert_eq!(tail("only", 10), vec!["only"]);
    }

    #[test]
    fn test_alive_only_looks_at_recent_lines() {
        let content = "Human: hi\nAssistant: hello\n1\n2\n3\n4\n5\n";
        assert!(!StateInferenceEngine::is_alive(content, 5));
        assert!(StateInferenceEngine::is_alive(content, 6));
        assert!(StateInferenceEngine::is_alive("x\nHuman: ping\n\n\n\n\n\n\n", 5));
        assert!(!StateInferenceEngine::is_alive("$ ls\nsrc\n", 5));
    }

    #[test]
    fn test_responsiveness_last_marker_wins() {
        let content = "Human: fix the bug\nAssistant: on it\nediting src/main.rs";
        assert_eq!(StateInferenceEngine::responsiveness(content, 20), Responsiveness::Yes);

        let content = "Assistant: done\nHuman: next task please";
        assert_eq!(StateInferenceEngine::responsiveness(content, 20), Responsiveness::Waiting);
    }

    #[test]
    fn test_responsiveness_falls_back_to_status() {
        assert_eq!(
            StateInferenceEngine::responsiveness("Thinking...", 20),
            Responsiveness::Waiting
        );
        assert_eq!(
            StateInferenceEngine::responsiveness("user@host:~$ \n", 20),
            Responsiveness::No
        );
        assert_eq!(StateInferenceEngine::responsiveness("", 20), Responsiveness::No);
    }

    #[test]
    fn test_responsiveness_window_is_bounded() {
        let mut content = String::from("Assistant: early reply\n");
        for i in 0..25 {
            content.push_str(&format!("line {}\n", i));
        }
        assert_eq!(StateInferenceEngine::responsiveness(&content, 20), Responsiveness::No);
    }

    #[test]
    fn test_pane_scan() {
        let scan = PaneScan::from_content("Human: hi\nAssistant: hello", 5, 20);
        assert!(scan.alive);
        assert_eq!(scan.responsiveness, Responsiveness::Yes);
    }
}
