use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use std::process::{ExitCode, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

mod actions;
mod app;
mod cli;
mod config;
mod error;
mod health;
mod logging;
mod orchestrator;
mod output;
mod registry;
mod team;
mod templates;
mod tmux;

use actions::Action;
use app::App;
use cli::Cli;
use orchestrator::Orchestrator;
use tmux::TmuxClient;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    output::init();

    // The dashboard owns the terminal, so its logs go to a file.
    if cli.command.is_dashboard() {
        let log_path = config::home_dir().map(|home| home.join("dashboard.log"));
        if let Err(e) = log_path.map_err(anyhow::Error::from).and_then(|p| logging::init_file(cli.verbose, &p)) {
            output::error(format!("failed to initialize logging: {:#}", e));
            return ExitCode::FAILURE;
        }
    } else {
        logging::init(cli.verbose);
    }

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Run the full-screen monitor until the user quits.
pub(crate) async fn run_dashboard(orch: Arc<Orchestrator<TmuxClient>>) -> Result<()> {
    // Create event channel
    let (tx, mut rx) = mpsc::unbounded_channel::<Action>();

    // Initialize terminal
    let mut terminal = ratatui::init();

    // Spawn input handler
    let input_tx = tx.clone();
    tokio::spawn(async move {
        loop {
            if event::poll(Duration::from_millis(100)).unwrap_or(false) {
                if let Ok(Event::Key(key)) = event::read() {
                    if key.kind == KeyEventKind::Press && input_tx.send(Action::KeyPress(key)).is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Spawn tmux poller
    let poll_tx = tx.clone();
    let poll_orch = Arc::clone(&orch);
    tokio::spawn(async move {
        loop {
            let update = match poll_orch.health(None).await {
                Ok((report, views)) => Action::AgentsUpdated(views, report),
                Err(e) => Action::Error(format!("tmux: {}", e)),
            };
            if poll_tx.send(update).is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1000)).await;
        }
    });

    // Create app state
    let mut app = App::new();

    // Main event loop
    let result = loop {
        // Render
        terminal.draw(|f| app.render(f))?;

        // Process any pending actions from the app
        for pending_action in app.take_pending_actions() {
            match pending_action {
                Action::AttachSession(ref session) => {
                    // Suspend TUI and attach to session
                    ratatui::restore();

                    let cmd = orch.mux().attach_command(session);
                    let status = std::process::Command::new(&cmd[0])
                        .args(&cmd[1..])
                        .stdin(Stdio::inherit())
                        .stdout(Stdio::inherit())
                        .stderr(Stdio::inherit())
                        .status();

                    // Resume TUI
                    terminal = ratatui::init();

                    if let Err(e) = status {
                        app.message = Some(format!("Failed to attach: {}", e));
                    }
                }
                Action::SpawnAgent { session, role } => {
                    app.message = Some(format!("Starting {} in {}…", role, session));
                    let (orch, tx) = (Arc::clone(&orch), tx.clone());
                    tokio::spawn(async move {
                        let notice = match orch.spawn(&session, &role, None, true).await {
                            Ok(report) if report.briefed => {
                                format!("{} started and briefed", report.window.target())
                            }
                            Ok(report) => format!("{} started, not yet briefed", report.window.target()),
                            Err(e) => format!("Failed to spawn: {}", e),
                        };
                        let _ = tx.send(Action::Notice(notice));
                    });
                }
                Action::KillWindow(window) => {
                    let (orch, tx) = (Arc::clone(&orch), tx.clone());
                    tokio::spawn(async move {
                        let notice = match orch.kill_window(&window).await {
                            Ok(()) => format!("Killed {}", window.target()),
                            Err(e) => format!("Failed to kill: {}", e),
                        };
                        let _ = tx.send(Action::Notice(notice));
                    });
                }
                Action::BriefAgent { window, role } => {
                    let (orch, tx) = (Arc::clone(&orch), tx.clone());
                    tokio::spawn(async move {
                        let notice = match orch.brief(&window.target(), &role).await {
                            Ok(template) => format!("Briefed {} as {}", window.target(), template.role),
                            Err(e) => format!("Failed to brief: {}", e),
                        };
                        let _ = tx.send(Action::Notice(notice));
                    });
                }
                _ => {}
            }
        }

        // Handle events from channel
        match rx.recv().await {
            Some(action) => match app.handle_action(action) {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(e) => break Err(e),
            },
            None => break Ok(()),
        }
    };

    // Restore terminal
    ratatui::restore();
    result
}
