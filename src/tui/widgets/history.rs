use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{tier_color, truncate};
use crate::models::DATE_FORMAT;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = match app.history_subject {
        Some(subject) => format!(" History ({}) ", subject.label()),
        None => " History ".to_string(),
    };

    let items: Vec<ListItem> = app
        .history
        .items
        .iter()
        .map(|entry| {
            let session = &entry.session;
            let date = session
                .date
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "----------".to_string());

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<5}", session.id.unwrap_or_default()),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format!("{:<12}", date), Style::default().fg(Color::White)),
                Span::styled(
                    format!("{:<14}", truncate(&session.subject, 13)),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:<26}", truncate(&session.topic, 25)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:>3}/{:<4}", session.correct, session.total),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(
                    format!("{:>5.1}% ", entry.accuracy),
                    Style::default().fg(tier_color(entry.tier)),
                ),
                Span::styled(
                    format!("step {}", entry.lineage_size),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    if items.is_empty() {
        f.render_widget(Paragraph::new("No sessions").block(block), area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.history.selected);

    f.render_stateful_widget(list, area, &mut state);
}
