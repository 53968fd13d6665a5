use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::group_lineages;
use crate::models::{accuracy, Session, Tier};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubjectTotals {
    pub questions: i64,
    pub correct: i64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_sessions: usize,
    pub total_questions: i64,
    pub total_correct: i64,
    pub accuracy: f64,
    pub by_subject: BTreeMap<String, SubjectTotals>,
    /// Lineages counted by the tier of their first session.
    pub cases: TierCounts,
}

impl Metrics {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut metrics = Metrics {
            total_sessions: sessions.len(),
            ..Default::default()
        };

        for session in sessions {
            // Imported counts can be arbitrarily large; saturate rather than wrap.
            metrics.total_questions = metrics.total_questions.saturating_add(session.total);
            metrics.total_correct = metrics.total_correct.saturating_add(session.correct);

            let totals = metrics
                .by_subject
                .entry(session.subject.clone())
                .or_default();
            totals.questions = totals.questions.saturating_add(session.total);
            totals.correct = totals.correct.saturating_add(session.correct);
        }

        for totals in metrics.by_subject.values_mut() {
            totals.accuracy = accuracy(totals.correct, totals.questions);
        }
        metrics.accuracy = accuracy(metrics.total_correct, metrics.total_questions);

        for lineage in group_lineages(sessions).values() {
            let Some(initial) = lineage.first() else {
                continue;
            };
            match Tier::from_accuracy(initial.accuracy()) {
                Tier::A => metrics.cases.a += 1,
                Tier::B => metrics.cases.b += 1,
                Tier::C => metrics.cases.c += 1,
            }
        }

        metrics
    }

    pub fn lineages(&self) -> usize {
        self.cases.a + self.cases.b + self.cases.c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::valid_sessions;
    use crate::models::SessionRecord;
    use pretty_assertions::assert_eq;

    fn record(subject: &str, topic: &str, ts: i64, total: &str, correct: &str) -> SessionRecord {
        SessionRecord {
            id: None,
            subject: subject.to_string(),
            topic: topic.to_string(),
            date: Some("2024-03-01".to_string()),
            timestamp: Some(ts.to_string()),
            total: Some(total.to_string()),
            correct: Some(correct.to_string()),
            wrong_questions: vec![],
            is_discursive: None,
        }
    }

    #[test]
    fn empty_metrics() {
        let metrics = Metrics::from_sessions(&[]);
        assert_eq!(metrics.total_questions, 0);
        assert_eq!(metrics.accuracy, 0.0);
        assert_eq!(metrics.cases, TierCounts::default());
        assert!(metrics.by_subject.is_empty());
    }

    #[test]
    fn totals_and_subject_breakdown() {
        let sessions = valid_sessions(&[
            record("Biologia", "Citologia", 1, "10", "3"),
            record("Biologia", "Genética", 2, "10", "9"),
            record("Química", "Estequiometria", 3, "20", "16"),
        ]);
        let metrics = Metrics::from_sessions(&sessions);

        assert_eq!(metrics.total_sessions, 3);
        assert_eq!(metrics.total_questions, 40);
        assert_eq!(metrics.total_correct, 28);
        assert_eq!(metrics.accuracy, 70.0);
        assert_eq!(
            metrics.by_subject["Biologia"],
            SubjectTotals {
                questions: 20,
                correct: 12,
                accuracy: 60.0,
            }
        );
        assert_eq!(metrics.by_subject["Química"].accuracy, 80.0);
    }

    #[test]
    fn cases_count_lineages_by_initial_tier() {
        let sessions = valid_sessions(&[
            record("Biologia", "Citologia", 1, "10", "3"),
            // Later perfect score does not move the lineage out of tier A.
            record("Biologia", "citologia", 2, "10", "10"),
            record("Biologia", "Genética", 3, "10", "8"),
            record("Química", "Estequiometria", 4, "10", "9"),
        ]);
        let metrics = Metrics::from_sessions(&sessions);
        assert_eq!(metrics.cases, TierCounts { a: 1, b: 1, c: 1 });
        assert_eq!(metrics.lineages(), 3);
    }

    #[test]
    fn zero_question_subject_has_zero_accuracy() {
        let sessions = valid_sessions(&[record("Redação", "Tema", 1, "0", "0")]);
        let metrics = Metrics::from_sessions(&sessions);
        assert_eq!(metrics.by_subject["Redação"].accuracy, 0.0);
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let max = i64::MAX.to_string();
        let sessions = valid_sessions(&[
            record("Física", "Óptica", 1, &max, &max),
            record("Física", "Óptica", 2, "1e300", "1e300"),
            record("Física", "Ondas", 3, "10", "5"),
        ]);
        let metrics = Metrics::from_sessions(&sessions);
        assert_eq!(metrics.total_questions, i64::MAX);
        assert_eq!(metrics.total_correct, i64::MAX);
        assert_eq!(metrics.by_subject["Física"].questions, i64::MAX);
        assert_eq!(metrics.accuracy, 100.0);
    }
}
