use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::path::Path;
use tracing::{debug, warn};

use crate::models::{NewSession, Override, Overrides, SessionRecord, WrongQuestion, DATE_FORMAT};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        // date, timestamp, total and correct carry no declared type so rows
        // keep whatever the writer stored; the engine validates them on read.
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                topic TEXT NOT NULL,
                date,
                timestamp,
                total,
                correct,
                wrong_questions TEXT NOT NULL DEFAULT '[]',
                is_discursive INTEGER,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS overrides (
                key TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject);
            "#,
        )?;

        self.migrate()?;
        Ok(())
    }

    // Databases created before the discursive flag lack its column.
    fn migrate(&self) -> Result<()> {
        let has_discursive = self
            .conn
            .prepare("SELECT is_discursive FROM sessions LIMIT 1")
            .is_ok();

        if !has_discursive {
            self.conn
                .execute_batch("ALTER TABLE sessions ADD COLUMN is_discursive INTEGER;")?;
        }

        Ok(())
    }

    // Session store
    pub fn add_session(&self, session: &NewSession, timestamp: i64) -> Result<i64> {
        let wrong = encode_wrong_questions(&session.wrong_questions);
        self.conn.execute(
            r#"
            INSERT INTO sessions (subject, topic, date, timestamp, total, correct, wrong_questions, is_discursive)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                session.subject_text,
                session.topic,
                session.date.format(DATE_FORMAT).to_string(),
                timestamp,
                session.total,
                session.correct,
                wrong,
                session.subject.is_discursive()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, subject = %session.subject_text, topic = %session.topic, "session stored");
        Ok(id)
    }

    pub fn get_session(&self, id: i64) -> Result<Option<SessionRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT id, subject, topic, date, timestamp, total, correct, wrong_questions, is_discursive
                FROM sessions
                WHERE id = ?1
                "#,
                params![id],
                record_from_row,
            )
            .optional()
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, subject, topic, date, timestamp, total, correct, wrong_questions, is_discursive
            FROM sessions
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([], record_from_row)?;
        rows.collect()
    }

    pub fn delete_session(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Appends raw records as-is, including malformed ones. A record without a
    /// timestamp is stored without one and left for the engine to skip.
    pub fn import_records(&self, records: &[SessionRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO sessions (subject, topic, date, timestamp, total, correct, wrong_questions, is_discursive)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for record in records {
                stmt.execute(params![
                    record.subject,
                    record.topic,
                    record.date,
                    record.timestamp,
                    record.total,
                    record.correct,
                    encode_wrong_questions(&record.wrong_questions),
                    record.is_discursive
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    // Override store
    pub fn set_override(&self, key: &str, date: NaiveDate) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO overrides (key, date, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET date = excluded.date, updated_at = excluded.updated_at
            "#,
            params![key, date.format(DATE_FORMAT).to_string()],
        )?;
        Ok(())
    }

    pub fn list_overrides(&self) -> Result<Vec<Override>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, date FROM overrides ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok(Override {
                key: row.get(0)?,
                date: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    pub fn load_overrides(&self) -> Result<Overrides> {
        Ok(self.list_overrides()?.into_iter().collect())
    }

    pub fn clear_override(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM overrides WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }
}

fn encode_wrong_questions(questions: &[WrongQuestion]) -> String {
    serde_json::to_string(questions).unwrap_or_else(|_| "[]".to_string())
}

fn record_from_row(row: &Row<'_>) -> Result<SessionRecord> {
    let id: i64 = row.get(0)?;
    let wrong_raw: String = row.get(7)?;
    let wrong_questions = serde_json::from_str(&wrong_raw).unwrap_or_else(|e| {
        warn!(id, error = %e, "unreadable wrong_questions column");
        Vec::new()
    });

    Ok(SessionRecord {
        id: Some(id),
        subject: row.get(1)?,
        topic: row.get(2)?,
        date: cell_text(row, 3)?,
        timestamp: cell_text(row, 4)?,
        total: cell_text(row, 5)?,
        correct: cell_text(row, 6)?,
        wrong_questions,
        is_discursive: row.get(8)?,
    })
}

// Untyped cells come back as whatever SQLite stored.
fn cell_text(row: &Row<'_>, idx: usize) -> Result<Option<String>> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorType, Session, Subject};

    fn setup_db() -> Database {
        let db = Database::open(":memory:").expect("Failed to create in-memory database");
        db.init().expect("Failed to initialize database");
        db
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_session(topic: &str, total: i64, correct: i64) -> NewSession {
        NewSession {
            subject: Subject::Biologia,
            subject_text: "Biologia".to_string(),
            topic: topic.to_string(),
            date: day(2024, 3, 1),
            total,
            correct,
            wrong_questions: vec![],
        }
    }

    mod init_tests {
        use super::*;

        #[test]
        fn init_creates_tables() {
            let db = setup_db();
            let tables: Vec<String> = db
                .conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap()
                .query_map([], |row| row.get(0))
                .unwrap()
                .collect::<Result<Vec<_>>>()
                .unwrap();

            assert!(tables.contains(&"sessions".to_string()));
            assert!(tables.contains(&"overrides".to_string()));
        }

        #[test]
        fn init_is_idempotent() {
            let db = setup_db();
            db.init().expect("Second init should succeed");
            db.init().expect("Third init should succeed");
        }

        #[test]
        fn init_adds_discursive_column_to_old_tables() {
            let db = Database::open(":memory:").unwrap();
            db.conn
                .execute_batch(
                    "CREATE TABLE sessions (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        subject TEXT NOT NULL,
                        topic TEXT NOT NULL,
                        date, timestamp, total, correct,
                        wrong_questions TEXT NOT NULL DEFAULT '[]',
                        created_at TEXT NOT NULL DEFAULT (datetime('now'))
                    );
                    INSERT INTO sessions (subject, topic, date, timestamp, total, correct)
                    VALUES ('Biologia', 'x', '2024-03-01', 1, 10, 4);",
                )
                .unwrap();
            db.init().unwrap();

            let stored = db.list_sessions().unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].is_discursive, None);
            db.add_session(&new_session("Citologia", 10, 7), 2).unwrap();
        }
    }

    mod session_tests {
        use super::*;

        #[test]
        fn add_session_round_trips_fields() {
            let db = setup_db();
            let mut session = new_session("Citologia", 10, 7);
            session.wrong_questions = vec![WrongQuestion::new("Q3", ErrorType::Trick)];

            let id = db.add_session(&session, 1_709_290_000_000).unwrap();
            assert!(id > 0);

            let record = db.get_session(id).unwrap().unwrap();
            assert_eq!(record.id, Some(id));
            assert_eq!(record.subject, "Biologia");
            assert_eq!(record.topic, "Citologia");
            assert_eq!(record.date.as_deref(), Some("2024-03-01"));
            assert_eq!(record.timestamp.as_deref(), Some("1709290000000"));
            assert_eq!(record.total.as_deref(), Some("10"));
            assert_eq!(record.correct.as_deref(), Some("7"));
            assert_eq!(record.wrong_questions[0].error_type, "Pegadinha");
        }

        #[test]
        fn add_session_records_discursive_flag() {
            let db = setup_db();
            let bio = db.add_session(&new_session("Citologia", 10, 7), 1).unwrap();
            let mut physics = new_session("Cinemática", 10, 7);
            physics.subject = Subject::Fisica;
            physics.subject_text = Subject::Fisica.label().to_string();
            let physics = db.add_session(&physics, 2).unwrap();

            assert_eq!(db.get_session(bio).unwrap().unwrap().is_discursive, Some(true));
            assert_eq!(db.get_session(physics).unwrap().unwrap().is_discursive, Some(false));
        }

        #[test]
        fn import_keeps_discursive_flag() {
            let db = setup_db();
            let records: Vec<SessionRecord> = serde_json::from_str(
                r#"[{"subject": "Biologia", "topic": "a", "timestamp": 1, "isDiscursive": true},
                    {"subject": "Biologia", "topic": "b", "timestamp": 2}]"#,
            )
            .unwrap();
            db.import_records(&records).unwrap();

            let stored = db.list_sessions().unwrap();
            assert_eq!(stored[0].is_discursive, Some(true));
            assert_eq!(stored[1].is_discursive, None);
        }

        #[test]
        fn stored_session_validates() {
            let db = setup_db();
            let id = db.add_session(&new_session("Citologia", 10, 3), 5).unwrap();
            let record = db.get_session(id).unwrap().unwrap();
            let session = Session::from_record(&record).unwrap();
            assert_eq!(session.accuracy(), 30.0);
            assert_eq!(session.timestamp, 5);
        }

        #[test]
        fn get_session_not_found() {
            let db = setup_db();
            assert!(db.get_session(999).unwrap().is_none());
        }

        #[test]
        fn list_sessions_in_insert_order() {
            let db = setup_db();
            db.add_session(&new_session("B", 10, 5), 2).unwrap();
            db.add_session(&new_session("A", 10, 5), 1).unwrap();

            let records = db.list_sessions().unwrap();
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].topic, "B");
            assert_eq!(records[1].topic, "A");
        }

        #[test]
        fn delete_session_success() {
            let db = setup_db();
            let id = db.add_session(&new_session("A", 10, 5), 1).unwrap();
            assert!(db.delete_session(id).unwrap());
            assert!(db.list_sessions().unwrap().is_empty());
        }

        #[test]
        fn delete_session_not_found() {
            let db = setup_db();
            assert!(!db.delete_session(42).unwrap());
        }

        #[test]
        fn corrupt_wrong_questions_load_as_empty() {
            let db = setup_db();
            let id = db.add_session(&new_session("A", 10, 5), 1).unwrap();
            db.conn
                .execute(
                    "UPDATE sessions SET wrong_questions = 'not json' WHERE id = ?1",
                    params![id],
                )
                .unwrap();
            let record = db.get_session(id).unwrap().unwrap();
            assert!(record.wrong_questions.is_empty());
        }
    }

    mod import_tests {
        use super::*;

        #[test]
        fn import_keeps_malformed_rows() {
            let db = setup_db();
            let records: Vec<SessionRecord> = serde_json::from_str(
                r#"[
                    {"subject": "Biologia", "topic": "Citologia", "date": "2024-03-01",
                     "timestamp": 1, "total": 10, "correct": 3},
                    {"subject": "Biologia", "topic": "Genética", "date": "2024-03-01",
                     "timestamp": 2, "total": "many", "correct": 3}
                ]"#,
            )
            .unwrap();

            assert_eq!(db.import_records(&records).unwrap(), 2);

            let stored = db.list_sessions().unwrap();
            assert_eq!(stored.len(), 2);
            assert_eq!(stored[1].total.as_deref(), Some("many"));
            assert!(Session::from_record(&stored[0]).is_some());
            assert!(Session::from_record(&stored[1]).is_none());
        }

        #[test]
        fn import_keeps_missing_timestamps_missing() {
            let db = setup_db();
            let records = vec![
                SessionRecord {
                    subject: "Física".to_string(),
                    topic: "Cinemática".to_string(),
                    date: Some("2024-03-01".to_string()),
                    timestamp: Some("1".to_string()),
                    total: Some("10".to_string()),
                    correct: Some("3".to_string()),
                    ..Default::default()
                },
                SessionRecord {
                    subject: "Física".to_string(),
                    topic: "Cinemática".to_string(),
                    total: Some("5".to_string()),
                    correct: Some("5".to_string()),
                    ..Default::default()
                },
            ];
            db.import_records(&records).unwrap();
            let stored = db.list_sessions().unwrap();
            assert!(stored[1].timestamp.is_none());
            assert!(stored[1].date.is_none());

            let projections = crate::engine::compute_projections(
                &stored,
                &db.load_overrides().unwrap(),
                day(2024, 3, 1),
            );
            assert_eq!(projections.len(), 1);
            assert_eq!(projections[0].session_ordinal, 1);
            assert_eq!(projections[0].case, crate::models::Case::Rescue);
        }

        #[test]
        fn real_cells_read_back_as_text() {
            let db = setup_db();
            db.conn
                .execute(
                    "INSERT INTO sessions (subject, topic, date, timestamp, total, correct) \
                     VALUES ('Biologia', 'x', '2024-03-01', 7, 10.0, 4)",
                    [],
                )
                .unwrap();
            let stored = db.list_sessions().unwrap();
            let session = Session::from_record(&stored[0]).unwrap();
            assert_eq!(session.total, 10);
        }
    }

    mod override_tests {
        use super::*;

        #[test]
        fn set_override_then_list() {
            let db = setup_db();
            db.set_override("Biologia-citologia", day(2024, 4, 1)).unwrap();

            let overrides = db.list_overrides().unwrap();
            assert_eq!(overrides.len(), 1);
            assert_eq!(overrides[0].key, "Biologia-citologia");
            assert_eq!(overrides[0].date, "2024-04-01");
        }

        #[test]
        fn set_override_upserts() {
            let db = setup_db();
            db.set_override("k", day(2024, 4, 1)).unwrap();
            db.set_override("k", day(2024, 5, 1)).unwrap();

            let overrides = db.load_overrides().unwrap();
            assert_eq!(overrides.len(), 1);
            assert_eq!(overrides.get("k"), Some("2024-05-01"));
        }

        #[test]
        fn clear_override_removes_pin() {
            let db = setup_db();
            db.set_override("k", day(2024, 4, 1)).unwrap();
            assert!(db.clear_override("k").unwrap());
            assert!(db.load_overrides().unwrap().is_empty());
        }

        #[test]
        fn clear_missing_override_is_not_an_error() {
            let db = setup_db();
            assert!(!db.clear_override("nothing").unwrap());
        }
    }
}
