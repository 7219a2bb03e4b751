mod client;
mod heuristics;

pub use client::{Multiplexer, TmuxClient};
pub use heuristics::{AgentStatus, PaneScan, Responsiveness};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CrewError;

/// Represents a tmux session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmuxSession {
    /// Session name
    pub name: String,
    /// Unix timestamp when session was created
    pub created_at: u64,
    /// Number of attached clients
    pub attached_clients: usize,
    /// Number of windows
    pub windows: usize,
}

/// Represents one window inside a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmuxWindow {
    pub session: String,
    pub index: u32,
    pub name: String,
    pub active: bool,
}

impl TmuxWindow {
    pub fn target(&self) -> Target {
        Target::window(&self.session, self.index.to_string())
    }
}

/// A `session[:window]` address. The window may be an index or a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub session: String,
    pub window: Option<String>,
}

impl Target {
    pub fn session(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            window: None,
        }
    }

    pub fn window(session: impl Into<String>, window: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            window: Some(window.into()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.window {
            Some(w) => write!(f, "{}:{}", self.session, w),
            None => f.write_str(&self.session),
        }
    }
}

impl FromStr for Target {
    type Err = CrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (session, window) = match s.split_once(':') {
            Some((session, window)) => (session, Some(window)),
            None => (s, None),
        };

        if session.is_empty() {
            return Err(CrewError::InvalidTarget(s.to_string()));
        }

        match window {
            Some(w) if w.is_empty() || w.contains(':') => Err(CrewError::InvalidTarget(s.to_string())),
            Some(w) => Ok(Target::window(session, w)),
            None => Ok(Target::session(session)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!("proj:2".parse::<Target>().unwrap(), Target::window("proj", "2"));
        assert_eq!("proj:qa".parse::<Target>().unwrap(), Target::window("proj", "qa"));
        assert_eq!("proj".parse::<Target>().unwrap(), Target::session("proj"));
    }

    #[test]
    fn test_reject_malformed_target() {
        for bad in ["", ":1", "proj:", "a:b:c", "  "] {
            assert!(bad.parse::<Target>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_target_display() {
        assert_eq!(Target::window("proj", "3").to_string(), "proj:3");
        assert_eq!(Target::session("proj").to_string(), "proj");
    }

    #[test]
    fn test_window_target_uses_index() {
        let window = TmuxWindow {
            session: "proj".to_string(),
            index: 4,
            name: "qa".to_string(),
            active: false,
        };
        assert_eq!(window.target().to_string(), "proj:4");
    }
}
