//! Configuration loading for tmux-crew.
//!
//! Settings live in `~/.tmux-crew/config.yaml`. Every field is optional; a
//! missing default file yields [`Config::default`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CrewError, Result};
use crate::team::TeamSize;

/// Get the tmux-crew home directory (~/.tmux-crew).
pub fn home_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CrewError::Config("Could not determine home directory".to_string()))?;
    Ok(home.join(".tmux-crew"))
}

/// Default config file location.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(home_dir()?.join("config.yaml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Command typed into a fresh window to start the assistant.
    pub agent_command: String,
    /// Registry file; defaults to `~/.tmux-crew/agents.json`.
    pub registry_path: Option<PathBuf>,
    /// Directory searched for `<role>.md` before the built-in templates.
    pub templates_dir: Option<PathBuf>,
    pub tmux: TmuxSettings,
    pub readiness: ReadinessSettings,
    pub monitor: MonitorSettings,
    pub team: TeamSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_command: "claude".to_string(),
            registry_path: None,
            templates_dir: None,
            tmux: TmuxSettings::default(),
            readiness: ReadinessSettings::default(),
            monitor: MonitorSettings::default(),
            team: TeamSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TmuxSettings {
    pub binary: String,
    pub command_timeout_ms: u64,
}

impl Default for TmuxSettings {
    fn default() -> Self {
        Self {
            binary: "tmux".to_string(),
            command_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReadinessSettings {
    /// Regex matched against the pane to decide the assistant is ready.
    pub pattern: String,
    pub attempts: u32,
    pub interval_ms: u64,
    /// Pause between typing text and pressing Enter.
    pub submit_delay_ms: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            pattern: r"(?m)(Human:|\? for shortcuts|^\s*>\s*$)".to_string(),
            attempts: 30,
            interval_ms: 1000,
            submit_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorSettings {
    pub liveness_lines: usize,
    pub responsiveness_lines: usize,
    pub interval_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            liveness_lines: 5,
            responsiveness_lines: 20,
            interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TeamSettings {
    /// Projects with fewer source files than this are `small`.
    pub small_below: usize,
    /// Projects with fewer source files than this (and not small) are `medium`.
    pub medium_below: usize,
    pub source_extensions: Vec<String>,
    pub presets: TeamPresets,
}

impl Default for TeamSettings {
    fn default() -> Self {
        Self {
            small_below: 50,
            medium_below: 200,
            source_extensions: [
                "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "kt", "c", "h", "cpp", "hpp",
                "cs", "rb", "php", "swift", "scala", "sh",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            presets: TeamPresets::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TeamPresets {
    pub small: Vec<String>,
    pub medium: Vec<String>,
    pub large: Vec<String>,
}

impl Default for TeamPresets {
    fn default() -> Self {
        let roles = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            small: roles(&["project-manager", "developer"]),
            medium: roles(&["project-manager", "developer", "qa"]),
            large: roles(&["project-manager", "developer", "developer", "qa", "devops"]),
        }
    }
}

impl TeamPresets {
    pub fn roles_for(&self, size: TeamSize) -> &[String] {
        match size {
            TeamSize::Small => &self.small,
            TeamSize::Medium => &self.medium,
            TeamSize::Large => &self.large,
        }
    }
}

impl Config {
    /// Load config from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; the default path may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path()?, false),
        };

        if !path.exists() {
            if required {
                return Err(CrewError::Config(format!(
                    "Config file not found at {}",
                    path.display()
                )));
            }
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_yaml(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map.
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.agent_command.trim().is_empty() {
            return Err(CrewError::Config("agent_command must not be empty".to_string()));
        }
        self.ready_regex()?;
        if self.readiness.attempts == 0 {
            return Err(CrewError::Config("readiness.attempts must be at least 1".to_string()));
        }
        if self.monitor.liveness_lines == 0 || self.monitor.responsiveness_lines == 0 {
            return Err(CrewError::Config("monitor line counts must be at least 1".to_string()));
        }
        if self.team.small_below >= self.team.medium_below {
            return Err(CrewError::Config(format!(
                "team.small_below ({}) must be less than team.medium_below ({})",
                self.team.small_below, self.team.medium_below
            )));
        }
        for size in [TeamSize::Small, TeamSize::Medium, TeamSize::Large] {
            if self.team.presets.roles_for(size).is_empty() {
                return Err(CrewError::Config(format!("team preset '{}' has no roles", size)));
            }
        }
        Ok(())
    }

    pub fn ready_regex(&self) -> Result<Regex> {
        Regex::new(&self.readiness.pattern)
            .map_err(|e| CrewError::Config(format!("invalid readiness.pattern: {}", e)))
    }

    pub fn registry_path(&self) -> Result<PathBuf> {
        match &self.registry_path {
            Some(p) => Ok(p.clone()),
            None => Ok(home_dir()?.join("agents.json")),
        }
    }

    pub fn templates_dir(&self) -> Result<PathBuf> {
        match &self.templates_dir {
            Some(p) => Ok(p.clone()),
            None => Ok(home_dir()?.join("templates")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = "agent_command: codex\nmonitor:\n  liveness_lines: 8\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.agent_command, "codex");
        assert_eq!(config.monitor.liveness_lines, 8);
        assert_eq!(config.monitor.responsiveness_lines, 20);
        assert_eq!(config.readiness.attempts, 30);
    }

    #[test]
    fn test_presets_override() {
        let yaml = "team:\n  presets:\n    small: [solo]\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.team.presets.roles_for(TeamSize::Small), ["solo".to_string()]);
        assert_eq!(config.team.presets.medium.len(), 3);
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let err = Config::from_yaml("readiness:\n  pattern: '('\n").unwrap_err();
        assert!(matches!(err, CrewError::Config(_)));
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let yaml = "team:\n  small_below: 300\n  medium_below: 200\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "registry_path: /tmp/x/agents.json\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(
            config.registry_path().unwrap(),
            PathBuf::from("/tmp/x/agents.json")
        );
    }
}
