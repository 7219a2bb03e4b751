//! Colored console output.

use crossterm::style::{style, Color, Stylize};
use std::fmt::Display;
use std::io::IsTerminal;

use crate::health::{HealthReport, HealthTier};
use crate::tmux::Responsiveness;

/// Turn colors off when stdout is not a terminal.
pub fn init() {
    if !std::io::stdout().is_terminal() {
        crossterm::style::force_color_output(false);
    }
}

pub fn success(msg: impl Display) {
    println!("{} {}", style("✓").with(Color::Green).bold(), msg);
}

pub fn info(msg: impl Display) {
    println!("{} {}", style("•").with(Color::Blue), msg);
}

pub fn warn(msg: impl Display) {
    eprintln!("{} {}", style("warning:").with(Color::Yellow).bold(), msg);
}

pub fn error(msg: impl Display) {
    eprintln!("{} {}", style("error:").with(Color::Red).bold(), msg);
}

pub fn heading(msg: impl Display) {
    println!("{}", style(msg).bold().underlined());
}

pub fn responsiveness_color(r: Responsiveness) -> Color {
    match r {
        Responsiveness::Yes => Color::Green,
        Responsiveness::Waiting => Color::Yellow,
        Responsiveness::No => Color::Red,
    }
}

pub fn tier_color(tier: HealthTier) -> Color {
    match tier {
        HealthTier::Healthy => Color::Green,
        HealthTier::Degraded => Color::Yellow,
        HealthTier::Critical => Color::Red,
    }
}

pub fn responsiveness(r: Responsiveness) -> String {
    style(format!("{:<7}", r)).with(responsiveness_color(r)).to_string()
}

/// One-line health summary, e.g. `health: 66% (2/3 responsive) degraded`.
pub fn health_line(label: &str, report: &HealthReport) -> String {
    let color = tier_color(report.tier);
    match report.score {
        Some(score) => format!(
            "{}: {} ({}/{} responsive) {}",
            label,
            style(format!("{}%", score)).with(color).bold(),
            report.responsive,
            report.total,
            style(report.tier).with(color)
        ),
        None => format!("{}: {}", label, style("no agents found").with(color)),
    }
}
