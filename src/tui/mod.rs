mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::{Datelike, Days, Local, NaiveDate, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::agenda::{self, HistoryEntry};
use crate::db::Database;
use crate::engine;
use crate::journal::{self, LogForm};
use crate::models::{parse_date, Projection, Subject, DATE_FORMAT};
use crate::stats::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Agenda,
    Calendar,
    Stats,
    History,
    Log,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Agenda => View::Calendar,
            View::Calendar => View::Stats,
            View::Stats => View::History,
            View::History => View::Agenda,
            View::Log => View::Log,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Agenda => View::History,
            View::Calendar => View::Agenda,
            View::Stats => View::Calendar,
            View::History => View::Stats,
            View::Log => View::Log,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    // Keeps the cursor near where it was after a reload.
    fn replace_items(&mut self, items: Vec<T>) {
        self.selected = match (self.selected, items.len()) {
            (_, 0) => None,
            (Some(i), len) => Some(i.min(len - 1)),
            (None, _) => Some(0),
        };
        self.items = items;
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) if i + 1 < self.items.len() => i + 1,
            _ => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Subject,
    Topic,
    Date,
    Total,
    Correct,
    Wrong,
}

impl FormField {
    pub const ALL: [FormField; 6] = [
        FormField::Subject,
        FormField::Topic,
        FormField::Date,
        FormField::Total,
        FormField::Correct,
        FormField::Wrong,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Subject => "Subject",
            FormField::Topic => "Topic",
            FormField::Date => "Date",
            FormField::Total => "Questions",
            FormField::Correct => "Correct",
            FormField::Wrong => "Wrong",
        }
    }

    fn next(&self) -> Self {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    fn prev(&self) -> Self {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Log form being edited, with the view to return to afterwards.
pub struct FormState {
    pub form: LogForm,
    pub field: FormField,
    pub error: Option<String>,
    /// Pending `REF:TYPE` entry for the wrong-question list.
    pub wrong_input: String,
    return_to: View,
}

impl FormState {
    fn new(form: LogForm, return_to: View) -> Self {
        // A prefilled form already has its topic, so start on the counts.
        let field = if form.topic.is_empty() {
            FormField::Topic
        } else {
            FormField::Total
        };
        Self {
            form,
            field,
            error: None,
            wrong_input: String::new(),
            return_to,
        }
    }

    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Subject => &self.form.subject,
            FormField::Topic => &self.form.topic,
            FormField::Date => &self.form.date,
            FormField::Total => &self.form.total,
            FormField::Correct => &self.form.correct,
            FormField::Wrong => &self.wrong_input,
        }
    }

    fn value_mut(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::Subject => None,
            FormField::Topic => Some(&mut self.form.topic),
            FormField::Date => Some(&mut self.form.date),
            FormField::Total => Some(&mut self.form.total),
            FormField::Correct => Some(&mut self.form.correct),
            FormField::Wrong => Some(&mut self.wrong_input),
        }
    }

    fn cycle_subject(&mut self, forward: bool) {
        let current = Subject::from_str(&self.form.subject).unwrap_or(Subject::ALL[0]);
        let next = if forward {
            current.next()
        } else {
            current.prev()
        };
        self.form.subject = next.label().to_string();
    }

    fn add_wrong_question(&mut self) {
        match journal::parse_wrong_question(&self.wrong_input) {
            Ok(question) => {
                self.form.wrong_questions.push(question);
                self.wrong_input.clear();
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }
}

pub struct App {
    db: Database,
    pub today: NaiveDate,
    pub view: View,
    pub tasks: StatefulList<Projection>,
    pub metrics: Metrics,
    pub history: StatefulList<HistoryEntry>,
    pub history_subject: Option<Subject>,
    pub calendar_day: NaiveDate,
    pub form: Option<FormState>,
    pub reschedule_input: Option<String>,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(db: Database, today: NaiveDate) -> Result<Self, Box<dyn std::error::Error>> {
        let mut app = Self {
            db,
            today,
            view: View::Agenda,
            tasks: StatefulList::with_items(Vec::new()),
            metrics: Metrics::default(),
            history: StatefulList::with_items(Vec::new()),
            history_subject: None,
            calendar_day: today,
            form: None,
            reschedule_input: None,
            status: None,
            should_quit: false,
        };
        app.refresh_data()?;
        Ok(app)
    }

    pub fn refresh_data(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let records = self.db.list_sessions()?;
        let overrides = self.db.load_overrides()?;
        let sessions = engine::valid_sessions(&records);

        self.tasks
            .replace_items(engine::project_sessions(&sessions, &overrides, self.today));
        self.metrics = Metrics::from_sessions(&sessions);
        let subject = self.history_subject.map(|s| s.label());
        self.history
            .replace_items(agenda::history(&sessions, subject));
        Ok(())
    }

    pub fn overdue_count(&self) -> usize {
        agenda::overdue(&self.tasks.items, self.today).len()
    }

    pub fn due_today(&self) -> Vec<&Projection> {
        agenda::tasks_on(&self.tasks.items, self.today)
    }

    pub fn calendar_tasks(&self) -> Vec<&Projection> {
        agenda::tasks_on(&self.tasks.items, self.calendar_day)
    }

    fn open_form(&mut self, form: LogForm) {
        self.form = Some(FormState::new(form, self.view));
        self.view = View::Log;
    }

    fn close_form(&mut self) {
        if let Some(state) = self.form.take() {
            self.view = state.return_to;
        }
    }

    fn submit_form(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(state) = self.form.as_mut() else {
            return Ok(());
        };
        match state.form.validate() {
            Err(e) => {
                state.error = Some(e.to_string());
            }
            Ok(_) => {
                let submitted = journal::submit(&self.db, &state.form, Utc::now())?;
                self.status = Some(format!("Logged session {}", submitted.id));
                self.close_form();
                self.refresh_data()?;
            }
        }
        Ok(())
    }

    fn save_reschedule(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(input) = self.reschedule_input.take() else {
            return Ok(());
        };
        let Some(task) = self.tasks.selected_item() else {
            return Ok(());
        };
        match parse_date(&input) {
            Some(date) => {
                let key = task.override_key.clone();
                journal::reschedule(&self.db, &key, date)?;
                self.status = Some(format!("Pinned {} to {}", task.topic, date));
                self.refresh_data()?;
            }
            None => {
                self.status = Some(format!("Invalid date '{}'. Use YYYY-MM-DD", input));
            }
        }
        Ok(())
    }

    fn unpin_selected(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(task) = self.tasks.selected_item() {
            let key = task.override_key.clone();
            if journal::unpin(&self.db, &key)? {
                self.status = Some(format!("Unpinned {}", task.topic));
                self.refresh_data()?;
            }
        }
        Ok(())
    }

    fn delete_selected_session(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let id = self
            .history
            .selected_item()
            .and_then(|entry| entry.session.id);
        if let Some(id) = id {
            if self.db.delete_session(id)? {
                self.status = Some(format!("Deleted session {}", id));
                self.refresh_data()?;
            }
        }
        Ok(())
    }

    fn cycle_history_subject(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.history_subject = match self.history_subject {
            None => Some(Subject::ALL[0]),
            Some(s) if s == Subject::ALL[Subject::ALL.len() - 1] => None,
            Some(s) => Some(s.next()),
        };
        self.history.selected = None;
        self.refresh_data()
    }

    fn move_calendar_day(&mut self, days: i64) {
        let moved = if days >= 0 {
            self.calendar_day.checked_add_days(Days::new(days as u64))
        } else {
            self.calendar_day.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        if let Some(day) = moved {
            self.calendar_day = day;
        }
    }

    fn move_calendar_month(&mut self, delta: i32) {
        let (year, month) =
            agenda::shift_month(self.calendar_day.year(), self.calendar_day.month(), delta);
        if let Some(day) = NaiveDate::from_ymd_opt(year, month, 1) {
            self.calendar_day = day;
        }
    }

    fn handle_form_key(&mut self, key: KeyCode) -> Result<(), Box<dyn std::error::Error>> {
        if key == KeyCode::Enter {
            if let Some(state) = self.form.as_mut() {
                if state.field == FormField::Wrong && !state.wrong_input.trim().is_empty() {
                    state.add_wrong_question();
                    return Ok(());
                }
            }
            return self.submit_form();
        }
        if key == KeyCode::Esc {
            self.close_form();
            return Ok(());
        }

        let Some(state) = self.form.as_mut() else {
            return Ok(());
        };
        match key {
            KeyCode::Tab | KeyCode::Down => state.field = state.field.next(),
            KeyCode::BackTab | KeyCode::Up => state.field = state.field.prev(),
            KeyCode::Left if state.field == FormField::Subject => state.cycle_subject(false),
            KeyCode::Right if state.field == FormField::Subject => state.cycle_subject(true),
            KeyCode::Backspace
                if state.field == FormField::Wrong && state.wrong_input.is_empty() =>
            {
                state.form.wrong_questions.pop();
            }
            KeyCode::Backspace => {
                if let Some(value) = state.value_mut() {
                    value.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(value) = state.value_mut() {
                    value.push(c);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_reschedule_key(&mut self, key: KeyCode) -> Result<(), Box<dyn std::error::Error>> {
        match key {
            KeyCode::Esc => self.reschedule_input = None,
            KeyCode::Enter => self.save_reschedule()?,
            KeyCode::Backspace => {
                if let Some(input) = self.reschedule_input.as_mut() {
                    input.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(input) = self.reschedule_input.as_mut() {
                    input.push(c);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_key(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if self.view == View::Log {
            return self.handle_form_key(key);
        }
        if self.reschedule_input.is_some() {
            return self.handle_reschedule_key(key);
        }

        self.status = None;

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
            }

            KeyCode::Tab => {
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.view = self.view.prev();
                } else {
                    self.view = self.view.next();
                }
            }
            KeyCode::BackTab => {
                self.view = self.view.prev();
            }

            KeyCode::Char('n') => self.open_form(LogForm::blank(self.today)),

            _ => match self.view {
                View::Agenda => self.handle_agenda_key(key)?,
                View::Calendar => self.handle_calendar_key(key),
                View::History => self.handle_history_key(key)?,
                View::Stats | View::Log => {}
            },
        }
        Ok(())
    }

    fn handle_agenda_key(&mut self, key: KeyCode) -> Result<(), Box<dyn std::error::Error>> {
        match key {
            KeyCode::Char('j') | KeyCode::Down => self.tasks.next(),
            KeyCode::Char('k') | KeyCode::Up => self.tasks.previous(),
            KeyCode::Char('g') => self.tasks.first(),
            KeyCode::Char('G') => self.tasks.last(),
            KeyCode::Enter | KeyCode::Char('l') => {
                if let Some(task) = self.tasks.selected_item() {
                    let form = LogForm::from_projection(task, self.today);
                    self.open_form(form);
                }
            }
            KeyCode::Char('m') => {
                if let Some(task) = self.tasks.selected_item() {
                    self.reschedule_input = Some(task.due_date.format(DATE_FORMAT).to_string());
                }
            }
            KeyCode::Char('u') => self.unpin_selected()?,
            _ => {}
        }
        Ok(())
    }

    fn handle_calendar_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('h') | KeyCode::Left => self.move_calendar_day(-1),
            KeyCode::Char('l') | KeyCode::Right => self.move_calendar_day(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_calendar_day(-7),
            KeyCode::Char('j') | KeyCode::Down => self.move_calendar_day(7),
            KeyCode::Char('[') => self.move_calendar_month(-1),
            KeyCode::Char(']') => self.move_calendar_month(1),
            KeyCode::Char('t') => self.calendar_day = self.today,
            _ => {}
        }
    }

    fn handle_history_key(&mut self, key: KeyCode) -> Result<(), Box<dyn std::error::Error>> {
        match key {
            KeyCode::Char('j') | KeyCode::Down => self.history.next(),
            KeyCode::Char('k') | KeyCode::Up => self.history.previous(),
            KeyCode::Char('g') => self.history.first(),
            KeyCode::Char('G') => self.history.last(),
            KeyCode::Char('s') => self.cycle_history_subject()?,
            KeyCode::Char('d') => self.delete_selected_session()?,
            _ => {}
        }
        Ok(())
    }
}

pub fn run(db: Database) -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = App::new(db, Local::now().date_naive())
        .and_then(|mut app| run_app(&mut terminal, &mut app));

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
