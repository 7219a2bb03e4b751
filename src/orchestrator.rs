//! Team operations composed from multiplexer calls, pane heuristics and the
//! registry.

use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::error::{CrewError, Result};
use crate::health::HealthReport;
use crate::registry::{AgentRecord, ReconcileSummary, Registry, RegistryDoc, SessionRecord};
use crate::team::{self, Detection, TeamSize};
use crate::templates::{self, RoleTemplate};
use crate::tmux::{Multiplexer, PaneScan, Target, TmuxWindow};

/// Requested team size for `setup`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeChoice {
    Auto,
    Fixed(TeamSize),
}

#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub project: PathBuf,
    pub session: Option<String>,
    pub size: SizeChoice,
    pub brief: bool,
}

#[derive(Debug, Clone)]
pub struct SetupReport {
    pub session: String,
    pub project: PathBuf,
    pub size: TeamSize,
    /// Present when the size was auto-detected
    pub detection: Option<Detection>,
    pub agents: Vec<SpawnReport>,
}

#[derive(Debug, Clone)]
pub struct SpawnReport {
    pub window: TmuxWindow,
    pub role: String,
    pub ready: bool,
    pub briefed: bool,
}

/// A live window joined with what the registry knows about it
#[derive(Debug, Clone)]
pub struct AgentView {
    pub window: TmuxWindow,
    pub role: Option<String>,
    pub scan: PaneScan,
}

/// Session name derived from a project directory.
///
/// tmux treats '.' and ':' in targets as separators, so anything outside
/// `[A-Za-z0-9_-]` becomes '-'.
pub fn session_name_for(project: &Path) -> String {
    let raw = project
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "crew".to_string());
    let sanitized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    if sanitized.trim_matches('-').is_empty() {
        "crew".to_string()
    } else {
        sanitized
    }
}

fn validate_project(project: &Path) -> Result<PathBuf> {
    let invalid = |reason: &str| CrewError::InvalidPath {
        path: project.to_path_buf(),
        reason: reason.to_string(),
    };
    if !project.exists() {
        return Err(invalid("does not exist"));
    }
    if !project.is_dir() {
        return Err(invalid("not a directory"));
    }
    Ok(project.canonicalize()?)
}

pub struct Orchestrator<M> {
    mux: M,
    config: Config,
    registry: Registry,
}

impl<M: Multiplexer> Orchestrator<M> {
    pub fn new(mux: M, config: Config, registry: Registry) -> Self {
        Self {
            mux,
            config,
            registry,
        }
    }

    pub fn mux(&self) -> &M {
        &self.mux
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn templates_dir(&self) -> Result<PathBuf> {
        self.config.templates_dir()
    }

    /// Create a session for `project` and start one agent per preset role.
    pub async fn setup(&self, request: SetupRequest) -> Result<SetupReport> {
        let project = validate_project(&request.project)?;
        let session = match request.session {
            Some(name) => name,
            None => session_name_for(&project),
        };
        if session.is_empty() || session.contains([':', '.']) {
            return Err(CrewError::InvalidTarget(session));
        }

        let (size, detection) = match request.size {
            SizeChoice::Fixed(size) => (size, None),
            SizeChoice::Auto => {
                let detection = team::detect(&project, &self.config.team)?;
                (detection.size, Some(detection))
            }
        };

        let roles = self.config.team.presets.roles_for(size).to_vec();
        let names = team::window_names(&roles);

        // Fail before touching tmux if a briefing cannot be found.
        if request.brief {
            let dir = self.templates_dir()?;
            for role in &roles {
                templates::load(role, &dir)?;
            }
        }

        if self.mux.has_session(&session).await? {
            return Err(CrewError::SessionExists(session));
        }

        tracing::info!(session = %session, project = %project.display(), %size, roles = roles.len(), "setting up team");

        let first = names
            .first()
            .ok_or_else(|| CrewError::Config(format!("team preset for {} is empty", size)))?;
        let first = self.mux.new_session(&session, first, &project).await?;

        let agents = match self.populate(first, &project, &names, request.brief).await {
            Ok(agents) => agents,
            Err(e) => {
                self.roll_back(&session).await;
                return Err(e);
            }
        };

        let session_record = SessionRecord {
            project_path: project.clone(),
            team_size: Some(size),
            created_at: Utc::now(),
        };
        let records: Vec<AgentRecord> = agents
            .iter()
            .map(|agent| AgentRecord::new(&session, agent.window.index.to_string(), &agent.role))
            .collect();
        let key = session.clone();
        let registered = self
            .registry
            .update_async(move |doc| {
                doc.sessions.insert(key, session_record);
                for record in records {
                    doc.upsert(record);
                }
            })
            .await;
        if let Err(e) = registered {
            self.roll_back(&session).await;
            return Err(e);
        }

        Ok(SetupReport {
            session,
            project,
            size,
            detection,
            agents,
        })
    }

    /// Fill a fresh session: one window per name after `first`, start the
    /// agents, then wait and brief.
    async fn populate(&self, first: TmuxWindow, project: &Path, names: &[String], brief: bool) -> Result<Vec<SpawnReport>> {
        let session = first.session.clone();
        self.start_agent(&first.target()).await?;
        let mut windows = vec![first];
        for name in names.iter().skip(1) {
            let window = self.mux.new_window(&session, name, project).await?;
            self.start_agent(&window.target()).await?;
            windows.push(window);
        }

        let mut agents = Vec::with_capacity(windows.len());
        for (window, name) in windows.into_iter().zip(names) {
            let target = window.target();
            let ready = self.wait_until_ready(&target).await?;
            let briefed = if brief && ready {
                self.brief(&target, name).await?;
                true
            } else {
                false
            };
            agents.push(SpawnReport {
                window,
                role: name.clone(),
                ready,
                briefed,
            });
        }
        Ok(agents)
    }

    /// Kill a half-built session so a retry does not hit `SessionExists`.
    async fn roll_back(&self, session: &str) {
        match self.mux.kill_session(session).await {
            Ok(()) => tracing::info!(session, "partial session removed"),
            Err(e) => tracing::warn!(session, error = %e, "failed to remove partial session"),
        }
    }

    /// Add one agent window to an existing session.
    pub async fn spawn(&self, session: &str, role: &str, cwd: Option<&Path>, brief: bool) -> Result<SpawnReport> {
        if !self.mux.has_session(session).await? {
            return Err(CrewError::SessionNotFound(session.to_string()));
        }
        if brief {
            templates::load(role, &self.templates_dir()?)?;
        }

        let cwd = match cwd {
            Some(path) => validate_project(path)?,
            None => self.default_cwd(session)?,
        };

        let existing: Vec<String> = self
            .mux
            .list_windows(session)
            .await?
            .into_iter()
            .map(|w| w.name)
            .collect();
        let name = unique_window_name(role, &existing);

        let window = self.mux.new_window(session, &name, &cwd).await?;
        let target = window.target();
        self.start_agent(&target).await?;
        let ready = self.wait_until_ready(&target).await?;
        let briefed = if brief && ready {
            self.brief(&target, &name).await?;
            true
        } else {
            false
        };

        let record = AgentRecord::new(session, window.index.to_string(), &name);
        self.registry.update_async(move |doc| doc.upsert(record)).await?;

        Ok(SpawnReport {
            window,
            role: name,
            ready,
            briefed,
        })
    }

    fn default_cwd(&self, session: &str) -> Result<PathBuf> {
        let doc = self.registry.load()?;
        match doc.sessions.get(session) {
            Some(record) if record.project_path.is_dir() => Ok(record.project_path.clone()),
            _ => Ok(std::env::current_dir()?),
        }
    }

    async fn start_agent(&self, target: &Target) -> Result<()> {
        self.mux.send_literal(target, &self.config.agent_command).await?;
        self.mux.send_keys(target, "Enter").await?;
        tracing::debug!(target = %target, command = %self.config.agent_command, "agent started");
        Ok(())
    }

    /// Poll the pane until the readiness pattern shows up.
    ///
    /// Returns `false` once the attempts are used up.
    pub async fn wait_until_ready(&self, target: &Target) -> Result<bool> {
        let pattern = self.config.ready_regex()?;
        let settings = &self.config.readiness;
        let interval = Duration::from_millis(settings.interval_ms);

        for attempt in 1..=settings.attempts {
            let content = self.mux.capture_pane(target).await?;
            if pattern.is_match(&content) {
                tracing::debug!(target = %target, attempt, "agent ready");
                return Ok(true);
            }
            if attempt < settings.attempts {
                tokio::time::sleep(interval).await;
            }
        }

        tracing::warn!(target = %target, attempts = settings.attempts, "agent did not become ready");
        Ok(false)
    }

    /// Type `text` into the agent and submit it.
    pub async fn deliver(&self, target: &Target, text: &str) -> Result<()> {
        let text = text.trim_end_matches(['\n', '\r']);
        if text.contains('\n') {
            self.mux.paste_text(target, text).await?;
        } else {
            self.mux.send_literal(target, text).await?;
        }
        tokio::time::sleep(Duration::from_millis(self.config.readiness.submit_delay_ms)).await;
        self.mux.send_keys(target, "Enter").await?;
        tracing::info!(target = %target, bytes = text.len(), "message delivered");
        Ok(())
    }

    /// Send the role template for `role` to `target`.
    pub async fn brief(&self, target: &Target, role: &str) -> Result<RoleTemplate> {
        let template = templates::load(role, &self.templates_dir()?)?;
        self.deliver(target, &template.text).await?;
        tracing::info!(target = %target, role = %template.role, source = %template.source, "agent briefed");
        Ok(template)
    }

    pub async fn check(&self, target: &Target) -> Result<PaneScan> {
        let content = self.mux.capture_pane(target).await?;
        Ok(self.scan(&content))
    }

    fn scan(&self, content: &str) -> PaneScan {
        let monitor = &self.config.monitor;
        PaneScan::from_content(content, monitor.liveness_lines, monitor.responsiveness_lines)
    }

    /// Scan every window of `session`, or of all sessions.
    pub async fn survey(&self, session: Option<&str>) -> Result<Vec<AgentView>> {
        let sessions: Vec<String> = match session {
            Some(name) => {
                if !self.mux.has_session(name).await? {
                    return Err(CrewError::SessionNotFound(name.to_string()));
                }
                vec![name.to_string()]
            }
            None => self
                .mux
                .list_sessions()
                .await?
                .into_iter()
                .map(|s| s.name)
                .collect(),
        };

        // Stale read is fine: roles are decoration here.
        let doc = self.registry.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "registry unreadable, showing windows without roles");
            RegistryDoc::default()
        });

        let mut views = Vec::new();
        for name in &sessions {
            for window in self.windows_of(name).await? {
                let scan = match self.mux.capture_pane(&window.target()).await {
                    Ok(content) => self.scan(&content),
                    Err(e) => {
                        tracing::warn!(target = %window.target(), error = %e, "capture failed");
                        PaneScan::default()
                    }
                };
                let role = doc
                    .find(&window.session, &window.index.to_string())
                    .map(|r| r.role.clone());
                views.push(AgentView { window, role, scan });
            }
        }
        Ok(views)
    }

    pub async fn health(&self, session: Option<&str>) -> Result<(HealthReport, Vec<AgentView>)> {
        let views = self.survey(session).await?;
        let report = HealthReport::from_buckets(views.iter().map(|v| v.scan.responsiveness));
        tracing::debug!(total = report.total, responsive = report.responsive, score = ?report.score, "health computed");
        Ok((report, views))
    }

    /// Align registry status with live windows, optionally dropping stale records.
    pub async fn reconcile(&self, prune: bool) -> Result<(RegistryDoc, ReconcileSummary, usize)> {
        let mut live = HashSet::new();
        for session in self.mux.list_sessions().await? {
            for window in self.windows_of(&session.name).await? {
                live.insert((window.session, window.index.to_string()));
            }
        }

        self.registry
            .update_async(move |doc| {
                let summary = doc.reconcile(&live);
                let pruned = if prune { doc.prune() } else { 0 };
                (doc.clone(), summary, pruned)
            })
            .await
    }

    /// Windows of a session that may have exited since it was listed.
    async fn windows_of(&self, session: &str) -> Result<Vec<TmuxWindow>> {
        match self.mux.list_windows(session).await {
            Err(CrewError::SessionNotFound(_)) => {
                tracing::debug!(session, "session went away while listing");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Kill a session and forget its agents.
    pub async fn kill(&self, session: &str) -> Result<usize> {
        if !self.mux.has_session(session).await? {
            return Err(CrewError::SessionNotFound(session.to_string()));
        }
        self.mux.kill_session(session).await?;
        let session = session.to_string();
        self.registry
            .update_async(move |doc| doc.remove_session(&session))
            .await
    }

    pub async fn kill_window(&self, window: &TmuxWindow) -> Result<()> {
        self.mux.kill_window(&window.target()).await?;
        let session = window.session.clone();
        let index = window.index.to_string();
        self.registry
            .update_async(move |doc| {
                doc.remove(&session, &index);
            })
            .await
    }
}

/// `role`, or `role-N` with the smallest N >= 2 not already taken.
fn unique_window_name(role: &str, existing: &[String]) -> String {
    if !existing.iter().any(|n| n == role) {
        return role.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", role, n))
        .find(|candidate| !existing.iter().any(|n| n == candidate))
        .unwrap_or_else(|| role.to_string())
}
