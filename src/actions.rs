use crossterm::event::KeyEvent;

use crate::health::HealthReport;
use crate::orchestrator::AgentView;
use crate::tmux::TmuxWindow;

/// Actions that can be dispatched through the application
#[derive(Debug, Clone)]
pub enum Action {
    /// A key was pressed
    KeyPress(KeyEvent),
    /// Fresh survey from tmux
    AgentsUpdated(Vec<AgentView>, HealthReport),
    /// An error occurred
    Error(String),
    /// A background task finished
    Notice(String),
    /// Attach to a session
    AttachSession(String),
    /// Start a new agent with the given role in a session
    SpawnAgent { session: String, role: String },
    /// Kill an agent's window
    KillWindow(TmuxWindow),
    /// Re-send the role template to an agent
    BriefAgent { window: TmuxWindow, role: String },
}
