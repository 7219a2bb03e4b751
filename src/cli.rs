//! CLI commands for tmux-crew using clap.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::{ExitCode, Stdio};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::orchestrator::{AgentView, Orchestrator, SetupRequest, SizeChoice};
use crate::output;
use crate::registry::{RecordStatus, Registry};
use crate::team::{self, TeamSize};
use crate::templates;
use crate::tmux::{Multiplexer, Target, TmuxClient, TmuxSession};

/// tmux-crew - start, brief and watch AI coding agents in tmux windows.
#[derive(Parser)]
#[command(name = "tmux-crew", version, about, long_about = None)]
pub struct Cli {
    /// Config file (YAML)
    #[arg(long, global = true, env = "TMUX_CREW_CONFIG")]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TeamSizeArg {
    Auto,
    Small,
    Medium,
    Large,
}

impl From<TeamSizeArg> for SizeChoice {
    fn from(arg: TeamSizeArg) -> Self {
        match arg {
            TeamSizeArg::Auto => SizeChoice::Auto,
            TeamSizeArg::Small => SizeChoice::Fixed(TeamSize::Small),
            TeamSizeArg::Medium => SizeChoice::Fixed(TeamSize::Medium),
            TeamSizeArg::Large => SizeChoice::Fixed(TeamSize::Large),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a session for a project and start a team of agents
    Setup {
        /// Project directory
        path: PathBuf,

        /// Session name (defaults to the directory name)
        #[arg(long, short)]
        session: Option<String>,

        /// Team size
        #[arg(long, value_enum, default_value = "auto")]
        team_size: TeamSizeArg,

        /// Start agents without sending role templates
        #[arg(long)]
        no_brief: bool,
    },

    /// Add one agent window to an existing session
    Spawn {
        session: String,
        role: String,

        /// Working directory (defaults to the session's project)
        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(long)]
        no_brief: bool,
    },

    /// Send a message to an agent
    Send {
        /// session or session:window
        target: String,

        /// Message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Send a role template to an agent
    Brief {
        target: String,
        role: String,
    },

    /// Exit 0 when the agent at TARGET looks alive, 1 otherwise
    Check {
        target: String,
    },

    /// Show responsiveness of every window
    Status {
        session: Option<String>,
    },

    /// Score team responsiveness
    Health {
        session: Option<String>,

        /// Repeat until interrupted
        #[arg(long)]
        continuous: bool,

        /// Seconds between checks in continuous mode
        #[arg(long)]
        interval: Option<u64>,
    },

    /// List registered agents, reconciled against live tmux
    Agents {
        #[arg(long)]
        session: Option<String>,

        /// Drop records whose window is gone
        #[arg(long)]
        prune: bool,

        /// Print the registry document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect the team size for a project
    TeamSize {
        path: PathBuf,
    },

    /// List role templates
    Templates,

    /// Kill a session and forget its agents
    Kill {
        session: String,
    },

    /// Attach this terminal to a session
    Attach {
        session: String,
    },

    /// Full-screen monitor
    Dashboard,
}

impl Command {
    pub fn is_dashboard(&self) -> bool {
        matches!(self, Command::Dashboard)
    }
}

fn build(config: Config) -> Result<Orchestrator<TmuxClient>> {
    let mux = TmuxClient::from_settings(&config.tmux);
    let registry = Registry::new(config.registry_path()?);
    Ok(Orchestrator::new(mux, config, registry))
}

fn parse_target(raw: &str) -> Result<Target> {
    Ok(raw.parse::<Target>()?)
}

impl Cli {
    pub async fn run(self) -> Result<ExitCode> {
        let config = Config::load(self.config.as_deref()).context("failed to load config")?;

        match self.command {
            Command::Setup {
                path,
                session,
                team_size,
                no_brief,
            } => cmd_setup(config, path, session, team_size, !no_brief).await,
            Command::Spawn {
                session,
                role,
                path,
                no_brief,
            } => cmd_spawn(config, &session, &role, path, !no_brief).await,
            Command::Send { target, message } => cmd_send(config, &target, &message.join(" ")).await,
            Command::Brief { target, role } => cmd_brief(config, &target, &role).await,
            Command::Check { target } => cmd_check(config, &target).await,
            Command::Status { session } => cmd_status(config, session.as_deref()).await,
            Command::Health {
                session,
                continuous,
                interval,
            } => cmd_health(config, session.as_deref(), continuous, interval).await,
            Command::Agents {
                session,
                prune,
                json,
            } => cmd_agents(config, session.as_deref(), prune, json).await,
            Command::TeamSize { path } => cmd_team_size(config, path),
            Command::Templates => cmd_templates(config),
            Command::Kill { session } => cmd_kill(config, &session).await,
            Command::Attach { session } => cmd_attach(config, &session).await,
            Command::Dashboard => {
                crate::run_dashboard(Arc::new(build(config)?)).await?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

async fn cmd_setup(
    config: Config,
    path: PathBuf,
    session: Option<String>,
    size: TeamSizeArg,
    brief: bool,
) -> Result<ExitCode> {
    let orch = build(config)?;
    output::info(format!("Setting up agents for {}", path.display()));

    let report = orch
        .setup(SetupRequest {
            project: path,
            session,
            size: size.into(),
            brief,
        })
        .await?;

    match report.detection {
        Some(detection) => output::info(format!(
            "Detected {} source files: {} team",
            detection.source_files, report.size
        )),
        None => output::info(format!("Team size: {}", report.size)),
    }

    for agent in &report.agents {
        let target = agent.window.target();
        if !agent.ready {
            output::warn(format!(
                "{} ({}) did not show a prompt; briefing skipped. Run `tmux-crew brief {} {}` once it is up.",
                target, agent.role, target, agent.role
            ));
        } else if agent.briefed {
            output::success(format!("{} started and briefed as {}", target, agent.role));
        } else {
            output::success(format!("{} started as {}", target, agent.role));
        }
    }

    output::success(format!(
        "Session '{}' ready for {}. Attach with `tmux-crew attach {}`",
        report.session,
        report.project.display(),
        report.session
    ));
    Ok(ExitCode::SUCCESS)
}

async fn cmd_spawn(
    config: Config,
    session: &str,
    role: &str,
    path: Option<PathBuf>,
    brief: bool,
) -> Result<ExitCode> {
    let orch = build(config)?;
    let report = orch.spawn(session, role, path.as_deref(), brief).await?;
    let target = report.window.target();

    if !report.ready {
        output::warn(format!("{} did not show a prompt; briefing skipped", target));
    } else if report.briefed {
        output::success(format!("{} started and briefed as {}", target, report.role));
    } else {
        output::success(format!("{} started as {}", target, report.role));
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_send(config: Config, target: &str, message: &str) -> Result<ExitCode> {
    if message.trim().is_empty() {
        bail!("refusing to send an empty message");
    }
    let target = parse_target(target)?;
    let orch = build(config)?;
    orch.deliver(&target, message)
        .await
        .with_context(|| format!("failed to send to {}", target))?;
    output::success(format!("Message sent to {}", target));
    Ok(ExitCode::SUCCESS)
}

async fn cmd_brief(config: Config, target: &str, role: &str) -> Result<ExitCode> {
    let target = parse_target(target)?;
    let orch = build(config)?;
    let template = orch.brief(&target, role).await?;
    output::success(format!(
        "Briefed {} as {} ({})",
        target, template.role, template.source
    ));
    Ok(ExitCode::SUCCESS)
}

async fn cmd_check(config: Config, target: &str) -> Result<ExitCode> {
    let target = parse_target(target)?;
    let orch = build(config)?;
    let scan = orch
        .check(&target)
        .await
        .with_context(|| format!("failed to capture {}", target))?;

    if scan.alive {
        output::success(format!(
            "{} is alive (responsive: {})",
            target,
            output::responsiveness(scan.responsiveness)
        ));
        Ok(ExitCode::SUCCESS)
    } else {
        output::error(format!("{} shows no agent activity", target));
        Ok(ExitCode::FAILURE)
    }
}

fn print_views(views: &[AgentView], sessions: &[TmuxSession]) {
    let mut current: Option<&str> = None;
    for view in views {
        if current != Some(view.window.session.as_str()) {
            current = Some(view.window.session.as_str());
            match sessions.iter().find(|s| s.name == view.window.session) {
                Some(s) => {
                    let created = chrono::DateTime::from_timestamp(s.created_at as i64, 0)
                        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    output::heading(format!(
                        "Session {} ({} windows, {} attached, created {})",
                        s.name, s.windows, s.attached_clients, created
                    ));
                }
                None => output::heading(format!("Session {}", view.window.session)),
            }
            println!(
                "  {:<16} {:<18} {:<18} {:<8} {:<6} STATUS",
                "TARGET", "WINDOW", "ROLE", "RESP", "ALIVE"
            );
        }
        let marker = if view.window.active { "*" } else { "" };
        println!(
            "  {:<16} {:<18} {:<18} {} {:<6} {:?}",
            view.window.target().to_string(),
            format!("{}{}", view.window.name, marker),
            view.role.as_deref().unwrap_or("-"),
            output::responsiveness(view.scan.responsiveness),
            if view.scan.alive { "yes" } else { "no" },
            view.scan.status
        );
    }
}

async fn cmd_status(config: Config, session: Option<&str>) -> Result<ExitCode> {
    let orch = build(config)?;
    let views = orch.survey(session).await?;
    if views.is_empty() {
        output::info("No tmux sessions running");
        return Ok(ExitCode::SUCCESS);
    }
    let sessions = orch.mux().list_sessions().await?;
    print_views(&views, &sessions);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_health(
    config: Config,
    session: Option<&str>,
    continuous: bool,
    interval: Option<u64>,
) -> Result<ExitCode> {
    let interval = Duration::from_secs(interval.unwrap_or(config.monitor.interval_secs).max(1));
    let orch = build(config)?;
    let label = session.unwrap_or("all sessions");

    loop {
        let (report, views) = orch.health(session).await?;

        if continuous {
            println!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), output::health_line(label, &report));
            for view in views.iter().filter(|v| !v.scan.responsiveness.is_responsive()) {
                output::warn(format!(
                    "{} ({}) is not responding",
                    view.window.target(),
                    view.role.as_deref().unwrap_or(&view.window.name)
                ));
            }
        } else {
            println!("{}", output::health_line(label, &report));
            let sessions = orch.mux().list_sessions().await?;
            print_views(&views, &sessions);
            return Ok(ExitCode::SUCCESS);
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(ExitCode::SUCCESS),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

async fn cmd_agents(config: Config, session: Option<&str>, prune: bool, json: bool) -> Result<ExitCode> {
    let orch = build(config)?;
    let (doc, summary, pruned) = orch.reconcile(prune).await?;

    if json {
        let doc = match session {
            Some(s) => doc.only_session(s),
            None => doc,
        };
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(ExitCode::SUCCESS);
    }

    let agents: Vec<_> = match session {
        Some(s) => doc.agents_in(s).collect(),
        None => doc.agents.iter().collect(),
    };

    if agents.is_empty() {
        output::info(format!("No agents registered in {}", orch.registry().path().display()));
    } else {
        println!(
            "  {:<16} {:<18} {:<8} CREATED",
            "TARGET", "ROLE", "STATUS"
        );
        for agent in agents {
            let status = match agent.status {
                RecordStatus::Active => "active",
                RecordStatus::Stale => "stale",
            };
            println!(
                "  {:<16} {:<18} {:<8} {}",
                format!("{}:{}", agent.session, agent.window),
                agent.role,
                status,
                agent.created_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    if summary.marked_stale > 0 {
        output::warn(format!("{} record(s) no longer match a live window", summary.marked_stale));
    }
    if pruned > 0 {
        output::success(format!("Pruned {} stale record(s)", pruned));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_team_size(config: Config, path: PathBuf) -> Result<ExitCode> {
    let detection = team::detect(&path, &config.team)?;
    let roles = config.team.presets.roles_for(detection.size);
    println!("size: {}", detection.size);
    println!("source files: {}", detection.source_files);
    println!("roles: {}", team::window_names(roles).join(", "));
    Ok(ExitCode::SUCCESS)
}

fn cmd_templates(config: Config) -> Result<ExitCode> {
    let dir = config.templates_dir()?;
    for (role, source) in templates::available(&dir)? {
        println!("  {:<18} {}", role, source);
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_kill(config: Config, session: &str) -> Result<ExitCode> {
    let orch = build(config)?;
    let removed = orch.kill(session).await?;
    output::success(format!(
        "Killed session '{}' ({} registry record(s) removed)",
        session, removed
    ));
    Ok(ExitCode::SUCCESS)
}

async fn cmd_attach(config: Config, session: &str) -> Result<ExitCode> {
    let orch = build(config)?;
    if !orch.mux().has_session(session).await? {
        bail!("session '{}' not found", session);
    }

    let mut cmd = orch.mux().attach_command(session);
    if std::env::var_os("TMUX").is_some() {
        // Nested attach is refused by tmux; switch the current client instead.
        cmd[1] = "switch-client".to_string();
    }

    let status = std::process::Command::new(&cmd[0])
        .args(&cmd[1..])
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .context("failed to run tmux attach")?;

    if status.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        bail!("tmux exited with {}", status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setup() {
        let cli = Cli::try_parse_from(["tmux-crew", "setup", "/tmp/p", "--team-size", "large", "--no-brief"]).unwrap();
        match cli.command {
            Command::Setup {
                path,
                team_size,
                no_brief,
                session,
            } => {
                assert_eq!(path, PathBuf::from("/tmp/p"));
                assert_eq!(team_size, TeamSizeArg::Large);
                assert!(no_brief);
                assert!(session.is_none());
            }
            _ => panic!("expected setup"),
        }
    }

    #[test]
    fn test_parse_send_joins_words() {
        let cli = Cli::try_parse_from(["tmux-crew", "-v", "send", "proj:1", "run", "tests"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Send { target, message } => {
                assert_eq!(target, "proj:1");
                assert_eq!(message.join(" "), "run tests");
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_send_requires_message() {
        assert!(Cli::try_parse_from(["tmux-crew", "send", "proj:1"]).is_err());
    }

    #[test]
    fn test_health_flags() {
        let cli = Cli::try_parse_from(["tmux-crew", "health", "proj", "--continuous", "--interval", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Health { continuous: true, interval: Some(5), .. }
        ));
    }

    #[test]
    fn test_size_choice_from_arg() {
        assert_eq!(SizeChoice::from(TeamSizeArg::Auto), SizeChoice::Auto);
        assert_eq!(
            SizeChoice::from(TeamSizeArg::Medium),
            SizeChoice::Fixed(TeamSize::Medium)
        );
    }
}
