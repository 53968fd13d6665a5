pub mod agenda;
pub mod calendar;
pub mod history;
pub mod log_form;
pub mod stats;

use ratatui::style::Color;

use crate::models::{Tier, Urgency};

pub(crate) fn urgency_color(urgency: Urgency) -> Color {
    match urgency {
        Urgency::High => Color::Red,
        Urgency::Medium => Color::Yellow,
        Urgency::Low => Color::Green,
    }
}

pub(crate) fn tier_color(tier: Tier) -> Color {
    match tier {
        Tier::A => Color::Red,
        Tier::B => Color::Yellow,
        Tier::C => Color::Green,
    }
}

/// Ten-cell bar for a 0..=100 percentage.
pub(crate) fn accuracy_bar(accuracy: f64) -> String {
    let filled = ((accuracy / 10.0).round() as usize).min(10);
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
