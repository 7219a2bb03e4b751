use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::actions::Action;
use crate::health::{HealthReport, HealthTier};
use crate::orchestrator::AgentView;
use crate::tmux::{AgentStatus, Responsiveness};

/// Dashboard colors
pub struct Theme {
    pub fg: Color,
    pub accent: Color,
    pub dim: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: Color::Rgb(220, 220, 220),
            accent: Color::Rgb(217, 119, 87),
            dim: Color::Rgb(100, 100, 100),
            success: Color::Rgb(80, 200, 120),
            warning: Color::Rgb(255, 193, 7),
            error: Color::Rgb(220, 53, 69),
        }
    }
}

impl Theme {
    fn responsiveness(&self, r: Responsiveness) -> Color {
        match r {
            Responsiveness::Yes => self.success,
            Responsiveness::Waiting => self.warning,
            Responsiveness::No => self.error,
        }
    }

    fn tier(&self, tier: HealthTier) -> Color {
        match tier {
            HealthTier::Healthy => self.success,
            HealthTier::Degraded => self.warning,
            HealthTier::Critical => self.error,
        }
    }

    fn status(&self, status: AgentStatus) -> Color {
        match status {
            AgentStatus::Busy => self.warning,
            AgentStatus::Idle => self.success,
            AgentStatus::WaitingForInput => self.accent,
            AgentStatus::Error => self.error,
            AgentStatus::Unknown => self.dim,
        }
    }
}

/// Input mode for the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing the role for a new agent
    Spawning,
    Confirming,
}

/// Main application state
pub struct App {
    /// Agents from the last survey
    pub agents: Vec<AgentView>,
    pub health: Option<HealthReport>,
    /// Currently selected agent index
    pub list_state: ListState,
    /// Current message to display (info or error)
    pub message: Option<String>,
    pub theme: Theme,
    /// Current input mode
    pub input_mode: InputMode,
    /// Text input buffer
    pub input_buffer: String,
    /// Pending action queue
    pub pending_actions: Vec<Action>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            agents: Vec::new(),
            health: None,
            list_state,
            message: None,
            theme: Theme::default(),
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            pending_actions: Vec::new(),
        }
    }

    /// Get the currently selected agent
    pub fn selected_agent(&self) -> Option<&AgentView> {
        self.list_state.selected().and_then(|i| self.agents.get(i))
    }

    /// Take pending actions (drains the queue)
    pub fn take_pending_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending_actions)
    }

    /// Handle an action and return whether to quit
    pub fn handle_action(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::KeyPress(key) => self.handle_key(key),
            Action::AgentsUpdated(agents, health) => {
                self.agents = agents;
                self.health = Some(health);
                // Ensure selection is valid
                if let Some(selected) = self.list_state.selected() {
                    if selected >= self.agents.len() && !self.agents.is_empty() {
                        self.list_state.select(Some(self.agents.len() - 1));
                    }
                }
                Ok(false)
            }
            Action::Error(msg) | Action::Notice(msg) => {
                self.message = Some(msg);
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        // Clear message on any key press
        if self.message.is_some() && self.input_mode == InputMode::Normal {
            self.message = None;
        }

        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Spawning => self.handle_spawning_key(key),
            InputMode::Confirming => self.handle_confirming_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.next_agent(),
            KeyCode::Char('k') | KeyCode::Up => self.previous_agent(),
            KeyCode::Enter => {
                if let Some(agent) = self.selected_agent() {
                    self.pending_actions
                        .push(Action::AttachSession(agent.window.session.clone()));
                }
            }
            KeyCode::Char('n') => {
                if self.selected_agent().is_some() {
                    self.input_mode = InputMode::Spawning;
                    self.input_buffer.clear();
                } else {
                    self.message = Some("Start a team with `tmux-crew setup` first".to_string());
                }
            }
            KeyCode::Char('d') => {
                if self.selected_agent().is_some() {
                    self.input_mode = InputMode::Confirming;
                }
            }
            KeyCode::Char('b') => {
                if let Some(agent) = self.selected_agent() {
                    let action = agent.role.clone().map(|role| Action::BriefAgent {
                        window: agent.window.clone(),
                        role,
                    });
                    match action {
                        Some(action) => self.pending_actions.push(action),
                        None => self.message = Some("No role recorded for this window".to_string()),
                    }
                }
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_spawning_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Enter => {
                if !self.input_buffer.is_empty() {
                    if let Some(agent) = self.selected_agent() {
                        let action = Action::SpawnAgent {
                            session: agent.window.session.clone(),
                            role: self.input_buffer.clone(),
                        };
                        self.pending_actions.push(action);
                    }
                    self.input_buffer.clear();
                }
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Esc => {
                self.input_buffer.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Char(c) => {
                // Only allow valid window name characters
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    self.input_buffer.push(c);
                }
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_confirming_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Some(agent) = self.selected_agent() {
                    self.pending_actions
                        .push(Action::KillWindow(agent.window.clone()));
                }
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    fn next_agent(&mut self) {
        if self.agents.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < self.agents.len() => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    fn previous_agent(&mut self) {
        if self.agents.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => self.agents.len() - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Main content
                Constraint::Length(3), // Footer/status
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_main(frame, chunks[1]);
        self.render_footer(frame, chunks[2]);

        // Render modal dialogs on top
        match self.input_mode {
            InputMode::Spawning => self.render_spawn_dialog(frame),
            InputMode::Confirming => self.render_confirm_dialog(frame),
            InputMode::Normal => {}
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::styled(
                " tmux-crew ",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("│ ", Style::default().fg(self.theme.dim)),
        ];

        match &self.health {
            Some(HealthReport {
                score: Some(score),
                responsive,
                total,
                tier,
            }) => {
                spans.push(Span::styled(
                    format!("health {}% ", score),
                    Style::default()
                        .fg(self.theme.tier(*tier))
                        .add_modifier(Modifier::BOLD),
                ));
                spans.push(Span::styled(
                    format!("({}/{} responsive, {})", responsive, total, tier),
                    Style::default().fg(self.theme.dim),
                ));
            }
            Some(_) => spans.push(Span::styled(
                "no agents running",
                Style::default().fg(self.theme.dim),
            )),
            None => spans.push(Span::styled("scanning…", Style::default().fg(self.theme.dim))),
        }

        let title = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(title, area);
    }

    fn render_main(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(40), // Agent list
                Constraint::Percentage(60), // Detail pane
            ])
            .split(area);

        self.render_agent_list(frame, chunks[0]);
        self.render_detail_pane(frame, chunks[1]);
    }

    fn render_agent_list(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = if self.agents.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "  No tmux windows found.",
                Style::default().fg(self.theme.dim),
            )))]
        } else {
            self.agents
                .iter()
                .map(|agent| {
                    let icon = match agent.scan.responsiveness {
                        Responsiveness::Yes => "● ",
                        Responsiveness::Waiting => "◐ ",
                        Responsiveness::No => "○ ",
                    };
                    let icon = Span::styled(
                        icon,
                        Style::default().fg(self.theme.responsiveness(agent.scan.responsiveness)),
                    );
                    let target = Span::styled(
                        format!("{:<12} ", agent.window.target().to_string()),
                        Style::default().fg(self.theme.fg),
                    );
                    let role = Span::styled(
                        agent.role.clone().unwrap_or_else(|| agent.window.name.clone()),
                        Style::default().fg(self.theme.dim),
                    );

                    ListItem::new(Line::from(vec![icon, target, role]))
                })
                .collect()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .title(" Agents ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.theme.dim)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::Rgb(50, 50, 50))
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn field<'a>(&self, label: &'a str, value: String, color: Color) -> Line<'a> {
        Line::from(vec![
            Span::styled(label, Style::default().fg(self.theme.dim)),
            Span::styled(value, Style::default().fg(color)),
        ])
    }

    fn render_detail_pane(&self, frame: &mut Frame, area: Rect) {
        let content = if let Some(agent) = self.selected_agent() {
            vec![
                self.field("Target: ", agent.window.target().to_string(), self.theme.fg),
                self.field("Window: ", agent.window.name.clone(), self.theme.fg),
                self.field(
                    "Role: ",
                    agent.role.clone().unwrap_or_else(|| "(unregistered)".to_string()),
                    self.theme.fg,
                ),
                self.field(
                    "Responsive: ",
                    agent.scan.responsiveness.to_string(),
                    self.theme.responsiveness(agent.scan.responsiveness),
                ),
                self.field(
                    "Alive: ",
                    if agent.scan.alive { "yes" } else { "no" }.to_string(),
                    if agent.scan.alive { self.theme.success } else { self.theme.error },
                ),
                self.field(
                    "Status: ",
                    format!("{:?}", agent.scan.status),
                    self.theme.status(agent.scan.status),
                ),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter: attach │ b: re-brief │ n: new agent │ d: kill window",
                    Style::default().fg(self.theme.dim),
                )),
            ]
        } else {
            vec![Line::from(Span::styled(
                "No agent selected",
                Style::default().fg(self.theme.dim),
            ))]
        };

        let detail = Paragraph::new(content).block(
            Block::default()
                .title(" Details ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(detail, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let help_text = " q: Quit │ j/k: Navigate │ Enter: Attach │ n: New │ b: Brief │ d: Kill ";

        let content = if let Some(ref msg) = self.message {
            let style = if msg.starts_with("Failed") || msg.starts_with("tmux") {
                Style::default().fg(self.theme.error)
            } else {
                Style::default().fg(self.theme.success)
            };
            Line::from(Span::styled(format!(" {} ", msg), style))
        } else {
            Line::from(Span::styled(help_text, Style::default().fg(self.theme.dim)))
        };

        let footer = Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(footer, area);
    }

    fn render_spawn_dialog(&self, frame: &mut Frame) {
        let area = centered_rect(50, 20, frame.area());

        frame.render_widget(Clear, area);

        let session = self
            .selected_agent()
            .map(|a| a.window.session.as_str())
            .unwrap_or("unknown");

        let block = Block::default()
            .title(format!(" New agent in '{}' ", session))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let text = vec![
            Line::from(""),
            Line::from(Span::styled("Enter role:", Style::default().fg(self.theme.fg))),
            Line::from(""),
            Line::from(Span::styled(
                format!("▶ {}_", self.input_buffer),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press Enter to start, Esc to cancel",
                Style::default().fg(self.theme.dim),
            )),
        ];

        frame.render_widget(Paragraph::new(text), inner);
    }

    fn render_confirm_dialog(&self, frame: &mut Frame) {
        let area = centered_rect(50, 20, frame.area());

        frame.render_widget(Clear, area);

        let block = Block::default()
            .title(" Confirm Kill ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.error));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let target = self
            .selected_agent()
            .map(|a| a.window.target().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("Kill window '{}'?", target),
                Style::default().fg(self.theme.fg),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "The agent running there is terminated.",
                Style::default().fg(self.theme.warning),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press 'y' to confirm, 'n' or Esc to cancel",
                Style::default().fg(self.theme.dim),
            )),
        ];

        frame.render_widget(Paragraph::new(text), inner);
    }
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
