//! The agent registry (`agents.json`).
//!
//! Live tmux state is authoritative; the registry only remembers what role
//! each window was started with. Every change is a locked
//! read-modify-write followed by an atomic rename.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::{CrewError, Result};
use crate::team::TeamSize;

/// How long a writer waits for the lock before giving up.
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_BACKOFF_START: Duration = Duration::from_millis(5);
const LOCK_BACKOFF_MAX: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    /// No live window matched on the last reconcile
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub session: String,
    /// Window index as tmux reports it
    pub window: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: RecordStatus,
}

impl AgentRecord {
    pub fn new(session: impl Into<String>, window: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            window: window.into(),
            role: role.into(),
            created_at: Utc::now(),
            status: RecordStatus::Active,
        }
    }

    fn key(&self) -> (&str, &str) {
        (&self.session, &self.window)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub project_path: PathBuf,
    #[serde(default)]
    pub team_size: Option<TeamSize>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDoc {
    #[serde(default)]
    pub agents: Vec<AgentRecord>,
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionRecord>,
}

/// Counts from [`RegistryDoc::reconcile`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub marked_stale: usize,
    pub revived: usize,
}

impl RegistryDoc {
    /// Insert or replace the record for the same session and window.
    pub fn upsert(&mut self, record: AgentRecord) {
        match self.agents.iter_mut().find(|r| r.key() == record.key()) {
            Some(existing) => *existing = record,
            None => self.agents.push(record),
        }
    }

    pub fn find(&self, session: &str, window: &str) -> Option<&AgentRecord> {
        self.agents.iter().find(|r| r.key() == (session, window))
    }

    pub fn agents_in<'a>(&'a self, session: &'a str) -> impl Iterator<Item = &'a AgentRecord> + 'a {
        self.agents.iter().filter(move |r| r.session == session)
    }

    pub fn remove(&mut self, session: &str, window: &str) -> bool {
        let before = self.agents.len();
        self.agents.retain(|r| r.key() != (session, window));
        self.agents.len() != before
    }

    /// Drop a session and all of its agents. Returns the number of agents removed.
    pub fn remove_session(&mut self, session: &str) -> usize {
        let before = self.agents.len();
        self.agents.retain(|r| r.session != session);
        self.sessions.remove(session);
        before - self.agents.len()
    }

    /// Mark records without a live `(session, window)` as stale, and revive
    /// stale ones whose window is back.
    pub fn reconcile(&mut self, live: &HashSet<(String, String)>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for record in &mut self.agents {
            let alive = live.contains(&(record.session.clone(), record.window.clone()));
            match (alive, record.status) {
                (false, RecordStatus::Active) => {
                    record.status = RecordStatus::Stale;
                    summary.marked_stale += 1;
                }
                (true, RecordStatus::Stale) => {
                    record.status = RecordStatus::Active;
                    summary.revived += 1;
                }
                _ => {}
            }
        }
        summary
    }

    /// Remove stale agents and sessions left without agents.
    pub fn prune(&mut self) -> usize {
        let before = self.agents.len();
        self.agents.retain(|r| r.status == RecordStatus::Active);
        let agents = &self.agents;
        self.sessions
            .retain(|name, _| agents.iter().any(|r| &r.session == name));
        before - self.agents.len()
    }

    /// Copy holding only `session` and its agents.
    pub fn only_session(&self, session: &str) -> RegistryDoc {
        RegistryDoc {
            agents: self.agents_in(session).cloned().collect(),
            sessions: self
                .sessions
                .iter()
                .filter(|(name, _)| name.as_str() == session)
                .map(|(name, record)| (name.clone(), record.clone()))
                .collect(),
        }
    }
}

/// Handle to the registry file on disk
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    lock_timeout: Duration,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Read the current document. A missing file is an empty registry.
    pub fn load(&self) -> Result<RegistryDoc> {
        if !self.path.exists() {
            return Ok(RegistryDoc::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(RegistryDoc::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// [`Registry::update`] on the blocking pool, for async callers.
    pub async fn update_async<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut RegistryDoc) -> T + Send + 'static,
    {
        let registry = self.clone();
        tokio::task::spawn_blocking(move || registry.update(f))
            .await
            .map_err(|e| CrewError::Io(std::io::Error::other(e)))?
    }

    /// Locked read-modify-write.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut RegistryDoc) -> T,
    {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock = self.acquire_lock()?;
        let mut doc = self.load()?;
        let out = f(&mut doc);
        self.write(&doc)?;
        // Explicit so the lock outlives the rename.
        drop(lock);
        Ok(out)
    }

    fn acquire_lock(&self) -> Result<File> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        // Capped exponential backoff with jitter, bounded by the timeout.
        let deadline = Instant::now() + self.lock_timeout;
        let mut backoff = LOCK_BACKOFF_START;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(file),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {}
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let jitter = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64);
            let pause = (backoff + Duration::from_millis(jitter)).min(deadline - now);
            std::thread::sleep(pause);
            backoff = (backoff * 2).min(LOCK_BACKOFF_MAX);
        }

        tracing::warn!(path = %lock_path.display(), timeout = ?self.lock_timeout, "registry lock contended");
        Err(CrewError::RegistryLock(self.path.clone()))
    }

    fn write(&self, doc: &RegistryDoc) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, doc)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        tracing::debug!(path = %self.path.display(), agents = doc.agents.len(), "registry saved");
        Ok(())
    }
}
