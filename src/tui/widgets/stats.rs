use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::{accuracy_bar, tier_color, truncate};
use crate::models::Tier;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // Totals + cases row
            Constraint::Min(0),    // Per subject
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    draw_totals(f, app, top_chunks[0]);
    draw_cases(f, app, top_chunks[1]);
    draw_subjects(f, app, chunks[1]);
}

fn stat_line<'a>(label: &'a str, value: String, color: Color) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_totals(f: &mut Frame, app: &App, area: Rect) {
    let metrics = &app.metrics;
    let overdue = app.overdue_count();

    let text = vec![
        Line::from(vec![
            Span::styled("Sessions: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", metrics.total_sessions),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        stat_line(
            "Questions: ",
            format!("{}", metrics.total_questions),
            Color::White,
        ),
        stat_line("Correct: ", format!("{}", metrics.total_correct), Color::Green),
        stat_line(
            "Accuracy: ",
            format!("{:.1}%", metrics.accuracy),
            tier_color(Tier::from_accuracy(metrics.accuracy)),
        ),
        stat_line(
            "Overdue: ",
            format!("{}", overdue),
            if overdue > 0 { Color::Red } else { Color::White },
        ),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Totals ")
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_cases(f: &mut Frame, app: &App, area: Rect) {
    let cases = &app.metrics.cases;

    let text = vec![
        stat_line("Topics: ", format!("{}", app.metrics.lineages()), Color::White),
        stat_line("Case A: ", format!("{}", cases.a), tier_color(Tier::A)),
        stat_line("Case B: ", format!("{}", cases.b), tier_color(Tier::B)),
        stat_line("Case C: ", format!("{}", cases.c), tier_color(Tier::C)),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Cases ")
        .title_style(Style::default().fg(Color::Yellow));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_subjects(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .metrics
        .by_subject
        .iter()
        .map(|(subject, totals)| {
            let color = tier_color(Tier::from_accuracy(totals.accuracy));
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<22}", truncate(subject, 21)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(accuracy_bar(totals.accuracy), Style::default().fg(color)),
                Span::styled(
                    format!(" {:>5.1}% ", totals.accuracy),
                    Style::default().fg(color),
                ),
                Span::styled(
                    format!("{}/{}", totals.correct, totals.questions),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" By Subject ")
        .title_style(Style::default().fg(Color::Magenta));

    f.render_widget(List::new(items).block(block), area);
}
