use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::{tier_color, truncate, urgency_color};
use crate::models::{Projection, DATE_FORMAT};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    draw_tasks(f, app, chunks[0]);
    draw_detail(f, app, chunks[1]);
}

fn draw_tasks(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .tasks
        .items
        .iter()
        .map(|task| {
            let (date_color, marker) = if task.due_date < app.today {
                (Color::Red, "!")
            } else if task.due_date == app.today {
                (Color::Yellow, " ")
            } else {
                (Color::White, " ")
            };
            let pin = if task.overridden { "*" } else { " " };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{}{} ", task.due_date.format(DATE_FORMAT), marker),
                    Style::default().fg(date_color),
                ),
                Span::styled(pin, Style::default().fg(Color::Magenta)),
                Span::styled(
                    format!("{:<14}", truncate(&task.subject, 13)),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:<26}", truncate(&task.topic, 25)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:>5.1}%", task.accuracy),
                    Style::default().fg(tier_color(task.tier)),
                ),
            ]))
        })
        .collect();

    let title = format!(
        " Agenda ({} due today, {} overdue) ",
        app.due_today().len(),
        app.overdue_count()
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    if items.is_empty() {
        let paragraph = Paragraph::new("No sessions logged yet. Press n to add one.").block(block);
        f.render_widget(paragraph, area);
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
    state.select(app.tasks.selected);

    f.render_stateful_widget(list, area, &mut state);
}

fn draw_detail(f: &mut Frame, app: &App, area: Rect) {
    let Some(task) = app.tasks.selected_item() else {
        let block = Block::default().borders(Borders::ALL).title(" Task ");
        let paragraph = Paragraph::new("No task selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", task.key))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(detail_lines(task))
        .block(block)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn detail_lines(task: &Projection) -> Vec<Line<'_>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled(task.case_label(), Style::default().fg(tier_color(task.tier))),
            Span::raw("  "),
            Span::styled(
                task.urgency.as_str(),
                Style::default().fg(urgency_color(task.urgency)),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            task.action.as_str(),
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Tier: ", Style::default().fg(Color::Gray)),
            Span::raw(task.tier.label()),
        ]),
        Line::from(vec![
            Span::styled("Session: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("#{}", task.session_ordinal)),
        ]),
        Line::from(vec![
            Span::styled("Latest accuracy: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{:.1}%", task.accuracy)),
        ]),
        Line::from(vec![
            Span::styled("Interval: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("+{} days", task.days_from_latest)),
        ]),
    ];

    if task.overridden {
        lines.push(Line::from(Span::styled(
            "Pinned manually",
            Style::default().fg(Color::Magenta),
        )));
    }

    if !task.wrong_questions.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Wrong questions:",
            Style::default().fg(Color::Gray),
        )));
        for question in &task.wrong_questions {
            lines.push(Line::from(vec![
                Span::styled("  • ", Style::default().fg(Color::Red)),
                Span::raw(format!("{} ({})", question.reference, question.error_type)),
            ]));
        }
    }

    lines
}
