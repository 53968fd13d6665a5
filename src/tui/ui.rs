use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{agenda, calendar, history, log_form, stats};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_help_bar(f, app, chunks[2]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let tab_titles = vec!["Agenda", "Calendar", "Stats", "History", "Log"];
    let selected = match app.view {
        View::Agenda => 0,
        View::Calendar => 1,
        View::Stats => 2,
        View::History => 3,
        View::Log => 4,
    };

    let title = format!(" Revisor · {} ", app.today.format("%a %d %b %Y"));
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title(title))
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Agenda => agenda::draw(f, app, area),
        View::Calendar => calendar::draw(f, app, area),
        View::Stats => stats::draw(f, app, area),
        View::History => history::draw(f, app, area),
        View::Log => log_form::draw(f, app, area),
    }
}

fn key_hint<'a>(key: &'a str, label: &'a str) -> [Span<'a>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Cyan)),
        Span::raw(label),
    ]
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let help_text: Vec<Span> = if let Some(input) = &app.reschedule_input {
        let mut spans = vec![
            Span::styled("Move to: ", Style::default().fg(Color::Yellow)),
            Span::raw(input.as_str()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
            Span::raw(" | "),
        ];
        spans.extend(key_hint("<CR>", " Save  "));
        spans.extend(key_hint("<Esc>", " Cancel"));
        spans
    } else if let Some(status) = &app.status {
        vec![Span::styled(
            status.as_str(),
            Style::default().fg(Color::Yellow),
        )]
    } else {
        let mut spans = Vec::new();

        match app.view {
            View::Agenda => {
                spans.extend(key_hint("<Tab>", " Views  "));
                spans.extend(key_hint("j/k", " Nav  "));
                spans.extend(key_hint("<CR>", " Log  "));
                spans.extend(key_hint("m", " Move  "));
                spans.extend(key_hint("u", " Unpin  "));
                spans.extend(key_hint("n", " New  "));
            }
            View::Calendar => {
                spans.extend(key_hint("<Tab>", " Views  "));
                spans.extend(key_hint("h/l", " Day  "));
                spans.extend(key_hint("j/k", " Week  "));
                spans.extend(key_hint("[/]", " Month  "));
                spans.extend(key_hint("t", " Today  "));
            }
            View::Stats => {
                spans.extend(key_hint("<Tab>", " Views  "));
                spans.extend(key_hint("^r", " Refresh  "));
            }
            View::History => {
                spans.extend(key_hint("<Tab>", " Views  "));
                spans.extend(key_hint("j/k", " Nav  "));
                spans.extend(key_hint("s", " Subject  "));
                spans.extend(key_hint("d", " Delete  "));
            }
            View::Log => {
                spans.extend(key_hint("<Tab>", " Field  "));
                spans.extend(key_hint("←/→", " Subject  "));
                spans.extend(key_hint("<CR>", " Save  "));
                spans.extend(key_hint("<Esc>", " Cancel"));
            }
        }

        if app.view != View::Log {
            spans.extend(key_hint("q", " Quit"));
        }

        spans
    };

    let help = Paragraph::new(Line::from(help_text)).style(Style::default().bg(Color::DarkGray));

    f.render_widget(help, area);
}
