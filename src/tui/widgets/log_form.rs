use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::models::{ErrorType, Subject};
use crate::tui::{App, FormField};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(state) = &app.form else {
        let block = Block::default().borders(Borders::ALL).title(" Log Session ");
        f.render_widget(Paragraph::new("No form open").block(block), area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(FormField::ALL.len() as u16 + 2), // Fields
            Constraint::Length(3),                               // Validation
            Constraint::Min(0),                                  // Wrong questions
        ])
        .split(area);

    let lines: Vec<Line> = FormField::ALL
        .iter()
        .map(|field| {
            let active = *field == state.field;
            let label_style = if active {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };

            let mut spans = vec![
                Span::styled(if active { "> " } else { "  " }, label_style),
                Span::styled(format!("{:<11}", field.label()), label_style),
                Span::styled(state.value(*field), Style::default().fg(Color::White)),
            ];
            if active && *field != FormField::Subject {
                spans.push(Span::styled("█", Style::default().fg(Color::Yellow)));
            }
            if *field == FormField::Subject
                && Subject::from_str(&state.form.subject).is_some_and(|s| s.is_discursive())
            {
                spans.push(Span::styled(
                    "  (discursive)",
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Line::from(spans)
        })
        .collect();

    let title = if state.form.topic.is_empty() {
        " Log Session ".to_string()
    } else {
        format!(" Log Session · {} ", state.form.topic)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(lines).block(block), chunks[0]);

    let (message, color) = match &state.error {
        Some(error) => (error.clone(), Color::Red),
        None => ("Press Enter to save".to_string(), Color::DarkGray),
    };
    let validation = Paragraph::new(Span::styled(message, Style::default().fg(color)))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(validation, chunks[1]);

    let mut wrong: Vec<Line> = if state.form.wrong_questions.is_empty() {
        vec![Line::from(Span::styled(
            "None. Type REF:TYPE in the Wrong field and press Enter",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        state
            .form
            .wrong_questions
            .iter()
            .map(|q| Line::from(format!("{} ({})", q.reference, q.error_type)))
            .collect()
    };
    wrong.push(Line::from(""));
    wrong.push(Line::from(Span::styled(
        format!("Types: {}", error_type_hint()),
        Style::default().fg(Color::DarkGray),
    )));
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Wrong Questions ")
        .title_style(Style::default().fg(Color::Magenta));
    let paragraph = Paragraph::new(wrong).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, chunks[2]);
}

fn error_type_hint() -> String {
    ErrorType::ALL
        .iter()
        .map(|t| t.label())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_lists_every_error_type() {
        let hint = error_type_hint();
        assert!(hint.starts_with("Falta de Conteúdo, "));
        assert!(hint.ends_with("Pegadinha"));
        assert_eq!(hint.matches(", ").count(), ErrorType::ALL.len() - 1);
    }
}
