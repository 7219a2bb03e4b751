//! Error types for tmux-crew.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrewError>;

#[derive(Error, Debug)]
pub enum CrewError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("tmux {command} failed: {stderr}")]
    Tmux { command: String, stderr: String },

    #[error("Session '{0}' already exists")]
    SessionExists(String),

    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    #[error("Invalid target '{0}': expected session or session:window")]
    InvalidTarget(String),

    #[error("Invalid project path {}: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("No role template for '{0}'")]
    TemplateNotFound(String),

    #[error("Could not lock registry at {}", .0.display())]
    RegistryLock(PathBuf),

    #[error("{0} timed out")]
    Timeout(String),
}

impl CrewError {
    pub fn tmux(command: &str, stderr: impl AsRef<[u8]>) -> Self {
        CrewError::Tmux {
            command: command.to_string(),
            stderr: String::from_utf8_lossy(stderr.as_ref()).trim().to_string(),
        }
    }
}
