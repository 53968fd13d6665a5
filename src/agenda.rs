use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::models::{Projection, Session, Tier, TopicKey};

// The filters take any iterator of projections so they can be chained.

pub fn tasks_on<'a>(
    projections: impl IntoIterator<Item = &'a Projection>,
    date: NaiveDate,
) -> Vec<&'a Projection> {
    projections
        .into_iter()
        .filter(|p| p.due_date == date)
        .collect()
}

pub fn overdue<'a>(
    projections: impl IntoIterator<Item = &'a Projection>,
    today: NaiveDate,
) -> Vec<&'a Projection> {
    projections
        .into_iter()
        .filter(|p| p.due_date < today)
        .collect()
}

pub fn filter_subject<'a>(
    projections: impl IntoIterator<Item = &'a Projection>,
    subject: Option<&str>,
) -> Vec<&'a Projection> {
    projections
        .into_iter()
        .filter(|p| subject.map_or(true, |s| p.subject == s))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay<'a> {
    /// `None` for the padding cells before the first of the month.
    pub date: Option<NaiveDate>,
    pub tasks: Vec<&'a Projection>,
}

/// Sunday-first month grid with the tasks due on each day.
pub fn month_grid(year: i32, month: u32, projections: &[Projection]) -> Option<Vec<CalendarDay<'_>>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month) = shift_month(year, month, 1);
    let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))?;

    let padding = first.weekday().num_days_from_sunday() as usize;
    let mut days: Vec<CalendarDay> = (0..padding)
        .map(|_| CalendarDay {
            date: None,
            tasks: Vec::new(),
        })
        .collect();

    let mut by_date: HashMap<NaiveDate, Vec<&Projection>> = HashMap::new();
    for p in projections {
        by_date.entry(p.due_date).or_default().push(p);
    }

    for date in first.iter_days().take_while(|d| *d <= last) {
        days.push(CalendarDay {
            date: Some(date),
            tasks: by_date.remove(&date).unwrap_or_default(),
        });
    }

    Some(days)
}

pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub session: Session,
    pub accuracy: f64,
    /// Tier of this session's own score.
    pub tier: Tier,
    /// Sessions recorded for the same topic key.
    pub lineage_size: usize,
}

/// Valid sessions, newest first, for the history table.
pub fn history(sessions: &[Session], subject: Option<&str>) -> Vec<HistoryEntry> {
    let mut sizes: HashMap<TopicKey, usize> = HashMap::new();
    for session in sessions {
        *sizes.entry(session.key()).or_default() += 1;
    }

    let mut entries: Vec<HistoryEntry> = sessions
        .iter()
        .filter(|s| subject.map_or(true, |wanted| s.subject == wanted))
        .map(|s| {
            let accuracy = s.accuracy();
            HistoryEntry {
                accuracy,
                tier: Tier::from_accuracy(accuracy),
                lineage_size: sizes.get(&s.key()).copied().unwrap_or(1),
                session: s.clone(),
            }
        })
        .collect();

    entries.sort_by_key(|e| Reverse((e.session.date, e.session.timestamp)));
    entries
}
