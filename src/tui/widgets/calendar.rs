use chrono::Datelike;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::{truncate, urgency_color};
use crate::agenda::{month_grid, CalendarDay};
use crate::tui::App;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const CELL_WIDTH: usize = 6;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(46), Constraint::Min(0)])
        .split(area);

    draw_month(f, app, chunks[0]);
    draw_day(f, app, chunks[1]);
}

fn draw_month(f: &mut Frame, app: &App, area: Rect) {
    let year = app.calendar_day.year();
    let month = app.calendar_day.month();
    let days = month_grid(year, month, &app.tasks.items).unwrap_or_default();

    let header = Line::from(
        WEEKDAYS
            .iter()
            .map(|d| {
                Span::styled(
                    format!("{:<width$}", d, width = CELL_WIDTH),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD),
                )
            })
            .collect::<Vec<_>>(),
    );

    let mut lines = vec![header, Line::from("")];
    for week in days.chunks(7) {
        lines.push(Line::from(
            week.iter().map(|day| day_cell(app, day)).collect::<Vec<_>>(),
        ));
        lines.push(Line::from(""));
    }

    let title = format!(" {} ", app.calendar_day.format("%B %Y"));
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn day_cell<'a>(app: &App, day: &CalendarDay<'a>) -> Span<'a> {
    let Some(date) = day.date else {
        return Span::raw(" ".repeat(CELL_WIDTH));
    };

    let count = if day.tasks.is_empty() {
        String::new()
    } else {
        format!("·{}", day.tasks.len())
    };
    let text = format!("{:>2}{:<width$}", date.day(), count, width = CELL_WIDTH - 2);

    let mut style = if day.tasks.iter().any(|t| t.due_date < app.today) {
        Style::default().fg(Color::Red)
    } else if !day.tasks.is_empty() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };
    if date == app.today {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if date == app.calendar_day {
        style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
    }

    Span::styled(text, style)
}

fn draw_day(f: &mut Frame, app: &App, area: Rect) {
    let tasks = app.calendar_tasks();

    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(
                        format!("{:<14}", truncate(&task.subject, 13)),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::styled(truncate(&task.topic, 30), Style::default().fg(Color::White)),
                ]),
                Line::from(vec![
                    Span::raw("  "),
                    Span::styled(
                        task.case_label(),
                        Style::default().fg(urgency_color(task.urgency)),
                    ),
                    Span::styled(
                        if task.overridden { " (pinned)" } else { "" },
                        Style::default().fg(Color::Magenta),
                    ),
                ]),
            ])
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", app.calendar_day.format("%a %d %b")))
        .title_style(Style::default().fg(Color::Yellow));

    if items.is_empty() {
        f.render_widget(Paragraph::new("Nothing scheduled").block(block), area);
        return;
    }

    f.render_widget(List::new(items).block(block), area);
}
