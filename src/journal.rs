//! Writing side of the planner: turning a filled-in log form into a stored
//! session, and pinning or unpinning a topic's next review date.
//!
//! Appending a session advances that topic's cycle, so any manual pin for its
//! key is dropped in the same step. A stale pin would otherwise keep
//! overriding the freshly computed date.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::db::Database;
use crate::error::FormError;
use crate::models::{parse_date, ErrorType, NewSession, Projection, Subject, WrongQuestion, DATE_FORMAT};

/// Log form contents as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogForm {
    pub subject: String,
    pub topic: String,
    pub date: String,
    pub total: String,
    pub correct: String,
    pub wrong_questions: Vec<WrongQuestion>,
    /// Subject text of the lineage the form was opened from. Stored as-is
    /// while the subject field still names the same subject, so the session
    /// lands in that lineage even when its stored text is not the label.
    pub lineage_subject: Option<String>,
}

impl LogForm {
    pub fn blank(today: NaiveDate) -> Self {
        Self {
            subject: Subject::ALL[0].label().to_string(),
            topic: String::new(),
            date: today.format(DATE_FORMAT).to_string(),
            total: String::new(),
            correct: String::new(),
            wrong_questions: Vec::new(),
            lineage_subject: None,
        }
    }

    /// Form prefilled for working through a scheduled task.
    pub fn from_projection(projection: &Projection, today: NaiveDate) -> Self {
        Self {
            subject: projection.subject.clone(),
            topic: projection.topic.clone(),
            lineage_subject: Some(projection.subject.clone()),
            ..Self::blank(today)
        }
    }

    pub fn validate(&self) -> Result<NewSession, FormError> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(FormError::MissingTopic);
        }

        let subject = Subject::from_str(&self.subject)
            .ok_or_else(|| FormError::UnknownSubject(self.subject.clone()))?;
        let subject_text = match &self.lineage_subject {
            Some(text) if Subject::from_str(text) == Some(subject) => text.clone(),
            _ => subject.label().to_string(),
        };

        let total = parse_whole("total", &self.total)?;
        if total < 1 {
            return Err(FormError::NoQuestions);
        }

        let correct = parse_whole("correct", &self.correct)?;
        if correct < 0 {
            return Err(FormError::NotANumber {
                field: "correct",
                value: self.correct.clone(),
            });
        }
        if correct > total {
            return Err(FormError::TooManyCorrect { correct, total });
        }

        let date = parse_date(&self.date).ok_or_else(|| FormError::InvalidDate(self.date.clone()))?;

        Ok(NewSession {
            subject,
            subject_text,
            topic: topic.to_string(),
            date,
            total,
            correct,
            wrong_questions: self.wrong_questions.clone(),
        })
    }
}

fn parse_whole(field: &'static str, value: &str) -> Result<i64, FormError> {
    value.trim().parse::<i64>().map_err(|_| FormError::NotANumber {
        field,
        value: value.to_string(),
    })
}

/// Parses `REF:TYPE`, e.g. `Q3:pegadinha`.
pub fn parse_wrong_question(entry: &str) -> Result<WrongQuestion, FormError> {
    let invalid = || FormError::InvalidWrongQuestion(entry.to_string());
    let (reference, kind) = entry.rsplit_once(':').ok_or_else(invalid)?;
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(invalid());
    }
    let error_type = ErrorType::from_str(kind).ok_or_else(invalid)?;
    Ok(WrongQuestion::new(reference, error_type))
}

#[derive(Debug, Clone, Serialize)]
pub struct Submitted {
    pub id: i64,
    pub override_key: String,
    pub cleared_override: bool,
}

/// Validates and stores the form, then drops the topic's manual pin.
pub fn submit(
    db: &Database,
    form: &LogForm,
    now: DateTime<Utc>,
) -> Result<Submitted, Box<dyn std::error::Error>> {
    let session = form.validate()?;
    let id = db.add_session(&session, now.timestamp_millis())?;

    let override_key = session.key().override_key();
    let cleared_override = db.clear_override(&override_key)?;

    info!(
        id,
        key = %override_key,
        accuracy = session.accuracy(),
        cleared_override,
        "session logged"
    );

    Ok(Submitted {
        id,
        override_key,
        cleared_override,
    })
}

pub fn reschedule(db: &Database, override_key: &str, date: NaiveDate) -> rusqlite::Result<()> {
    db.set_override(override_key, date)?;
    info!(key = override_key, %date, "review date pinned");
    Ok(())
}

pub fn unpin(db: &Database, override_key: &str) -> rusqlite::Result<bool> {
    let removed = db.clear_override(override_key)?;
    info!(key = override_key, removed, "review date unpinned");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compute_projections;
    use chrono::TimeZone;

    fn setup_db() -> Database {
        let db = Database::open(":memory:").expect("Failed to create in-memory database");
        db.init().expect("Failed to initialize database");
        db
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn filled(topic: &str, total: &str, correct: &str, date: &str) -> LogForm {
        LogForm {
            subject: "Biologia".to_string(),
            topic: topic.to_string(),
            date: date.to_string(),
            total: total.to_string(),
            correct: correct.to_string(),
            wrong_questions: vec![],
            lineage_subject: None,
        }
    }

    mod form_tests {
        use super::*;

        #[test]
        fn blank_form_defaults() {
            let form = LogForm::blank(day(2024, 3, 1));
            assert_eq!(form.subject, "Biologia");
            assert_eq!(form.date, "2024-03-01");
            assert!(form.topic.is_empty());
        }

        #[test]
        fn validate_accepts_good_form() {
            let session = filled(" Citologia ", "10", "7", "2024-03-01")
                .validate()
                .unwrap();
            assert_eq!(session.topic, "Citologia");
            assert_eq!(session.subject, Subject::Biologia);
            assert_eq!(session.total, 10);
            assert_eq!(session.date, day(2024, 3, 1));
        }

        #[test]
        fn validate_requires_topic() {
            let err = filled("   ", "10", "7", "2024-03-01").validate().unwrap_err();
            assert_eq!(err, FormError::MissingTopic);
        }

        #[test]
        fn validate_rejects_unknown_subject() {
            let mut form = filled("Citologia", "10", "7", "2024-03-01");
            form.subject = "Alquimia".to_string();
            assert!(matches!(form.validate(), Err(FormError::UnknownSubject(_))));
        }

        #[test]
        fn validate_rejects_bad_numbers() {
            assert!(matches!(
                filled("T", "ten", "7", "2024-03-01").validate(),
                Err(FormError::NotANumber { field: "total", .. })
            ));
            assert!(matches!(
                filled("T", "10", "", "2024-03-01").validate(),
                Err(FormError::NotANumber { field: "correct", .. })
            ));
            assert_eq!(
                filled("T", "0", "0", "2024-03-01").validate().unwrap_err(),
                FormError::NoQuestions
            );
            assert_eq!(
                filled("T", "10", "11", "2024-03-01").validate().unwrap_err(),
                FormError::TooManyCorrect {
                    correct: 11,
                    total: 10
                }
            );
        }

        #[test]
        fn validate_rejects_bad_date() {
            assert!(matches!(
                filled("T", "10", "5", "01/03/2024").validate(),
                Err(FormError::InvalidDate(_))
            ));
        }
    }

    mod wrong_question_tests {
        use super::*;

        #[test]
        fn parse_ref_and_type() {
            let q = parse_wrong_question("Q3:pegadinha").unwrap();
            assert_eq!(q.reference, "Q3");
            assert_eq!(q.error_type, "Pegadinha");
        }

        #[test]
        fn parse_uses_last_colon() {
            let q = parse_wrong_question("UEL 2023 Q7:time").unwrap();
            assert_eq!(q.reference, "UEL 2023 Q7");
            assert_eq!(q.error_type, "Tempo Insuficiente");
        }

        #[test]
        fn parse_rejects_missing_parts() {
            assert!(parse_wrong_question("Q3").is_err());
            assert!(parse_wrong_question(":trick").is_err());
            assert!(parse_wrong_question("Q3:sleepy").is_err());
        }
    }

    mod submit_tests {
        use super::*;

        #[test]
        fn submit_stores_session_with_timestamp() {
            let db = setup_db();
            let result = submit(&db, &filled("Citologia", "10", "3", "2024-03-01"), at(1000)).unwrap();

            let record = db.get_session(result.id).unwrap().unwrap();
            assert_eq!(record.timestamp.as_deref(), Some("1000"));
            assert_eq!(result.override_key, "Biologia-citologia");
        }

        #[test]
        fn submit_rejects_invalid_form_without_writing() {
            let db = setup_db();
            assert!(submit(&db, &filled("", "10", "3", "2024-03-01"), at(1)).is_err());
            assert!(db.list_sessions().unwrap().is_empty());
        }

        #[test]
        fn submit_clears_stale_override() {
            let db = setup_db();
            submit(&db, &filled("Citologia", "10", "3", "2024-03-01"), at(1)).unwrap();
            reschedule(&db, "Biologia-citologia", day(2024, 4, 1)).unwrap();

            let result = submit(&db, &filled("citologia ", "10", "10", "2024-03-02"), at(2)).unwrap();
            assert!(result.cleared_override);
            assert!(db.load_overrides().unwrap().is_empty());

            let projections = compute_projections(
                &db.list_sessions().unwrap(),
                &db.load_overrides().unwrap(),
                day(2024, 3, 2),
            );
            assert_eq!(projections.len(), 1);
            assert_eq!(projections[0].due_date, day(2024, 3, 5));
            assert!(!projections[0].overridden);
        }

        #[test]
        fn submit_keeps_other_topics_overrides() {
            let db = setup_db();
            reschedule(&db, "Biologia-genética", day(2024, 4, 1)).unwrap();
            submit(&db, &filled("Citologia", "10", "3", "2024-03-01"), at(1)).unwrap();
            assert_eq!(db.load_overrides().unwrap().len(), 1);
        }
    }

    mod prefill_tests {
        use super::*;

        #[test]
        fn from_projection_copies_subject_and_topic() {
            let db = setup_db();
            submit(&db, &filled("Citologia", "10", "3", "2024-03-01"), at(1)).unwrap();
            let projections = compute_projections(
                &db.list_sessions().unwrap(),
                &db.load_overrides().unwrap(),
                day(2024, 3, 1),
            );

            let form = LogForm::from_projection(&projections[0], day(2024, 3, 2));
            assert_eq!(form.subject, "Biologia");
            assert_eq!(form.topic, "Citologia");
            assert_eq!(form.date, "2024-03-02");
            assert!(form.total.is_empty());
        }

        #[test]
        fn logging_from_task_stays_in_its_lineage() {
            let db = setup_db();
            let imported: Vec<crate::models::SessionRecord> = serde_json::from_str(
                r#"[{"subject": "biologia", "topic": "Citologia", "date": "2024-03-01",
                     "timestamp": 1, "total": 10, "correct": 3}]"#,
            )
            .unwrap();
            db.import_records(&imported).unwrap();
            reschedule(&db, "biologia-citologia", day(2024, 3, 20)).unwrap();

            let projections =
                compute_projections(&db.list_sessions().unwrap(), &db.load_overrides().unwrap(), day(2024, 3, 2));
            let mut form = LogForm::from_projection(&projections[0], day(2024, 3, 2));
            form.total = "10".to_string();
            form.correct = "9".to_string();
            let result = submit(&db, &form, at(2)).unwrap();

            assert_eq!(result.override_key, "biologia-citologia");
            assert!(result.cleared_override);
            assert_eq!(db.get_session(result.id).unwrap().unwrap().subject, "biologia");
            let projections =
                compute_projections(&db.list_sessions().unwrap(), &db.load_overrides().unwrap(), day(2024, 3, 2));
            assert_eq!(projections.len(), 1);
            assert_eq!(projections[0].session_ordinal, 2);
        }

        #[test]
        fn changing_subject_drops_lineage_text() {
            let mut form = filled("Citologia", "10", "7", "2024-03-01");
            form.lineage_subject = Some("biologia".to_string());
            assert_eq!(form.validate().unwrap().subject_text, "biologia");

            form.subject = "Química".to_string();
            let session = form.validate().unwrap();
            assert_eq!(session.subject_text, "Química");
            assert_eq!(session.key().override_key(), "Química-citologia");
        }
    }

    mod pin_tests {
        use super::*;

        #[test]
        fn reschedule_then_unpin() {
            let db = setup_db();
            reschedule(&db, "k", day(2024, 4, 1)).unwrap();
            assert_eq!(db.load_overrides().unwrap().get("k"), Some("2024-04-01"));
            assert!(unpin(&db, "k").unwrap());
            assert!(!unpin(&db, "k").unwrap());
        }
    }
}
