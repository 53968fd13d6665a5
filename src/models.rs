use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// Subjects offered by the log form. Discursive subjects get a star in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    Biologia,
    Quimica,
    Fisica,
    Matematica,
    Gramatica,
    Literatura,
    Historia,
    Geografia,
    FilosofiaSociologia,
    Ingles,
    Redacao,
}

impl Subject {
    pub const ALL: [Subject; 11] = [
        Subject::Biologia,
        Subject::Quimica,
        Subject::Fisica,
        Subject::Matematica,
        Subject::Gramatica,
        Subject::Literatura,
        Subject::Historia,
        Subject::Geografia,
        Subject::FilosofiaSociologia,
        Subject::Ingles,
        Subject::Redacao,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Subject::Biologia => "Biologia",
            Subject::Quimica => "Química",
            Subject::Fisica => "Física",
            Subject::Matematica => "Matemática",
            Subject::Gramatica => "Gramática",
            Subject::Literatura => "Literatura",
            Subject::Historia => "História",
            Subject::Geografia => "Geografia",
            Subject::FilosofiaSociologia => "Filosofia/Sociologia",
            Subject::Ingles => "Inglês",
            Subject::Redacao => "Redação",
        }
    }

    pub fn is_discursive(&self) -> bool {
        matches!(
            self,
            Subject::Biologia
                | Subject::Quimica
                | Subject::FilosofiaSociologia
                | Subject::Gramatica
                | Subject::Literatura
        )
    }

    // Accepts the display label (any case) or its accent-free spelling.
    pub fn from_str(s: &str) -> Option<Self> {
        let wanted = s.trim().to_lowercase();
        Subject::ALL.into_iter().find(|subject| {
            let label = subject.label().to_lowercase();
            label == wanted || fold_accents(&label) == fold_accents(&wanted)
        })
    }

    pub fn position(&self) -> usize {
        Subject::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or_default()
    }

    pub fn next(&self) -> Self {
        Subject::ALL[(self.position() + 1) % Subject::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let len = Subject::ALL.len();
        Subject::ALL[(self.position() + len - 1) % len]
    }
}

fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' => 'a',
            'é' | 'ê' => 'e',
            'í' => 'i',
            'ó' | 'ô' | 'õ' => 'o',
            'ú' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorType {
    MissingContent,
    Interpretation,
    Attention,
    Time,
    Calculation,
    Trick,
}

impl ErrorType {
    pub const ALL: [ErrorType; 6] = [
        ErrorType::MissingContent,
        ErrorType::Interpretation,
        ErrorType::Attention,
        ErrorType::Time,
        ErrorType::Calculation,
        ErrorType::Trick,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ErrorType::MissingContent => "Falta de Conteúdo",
            ErrorType::Interpretation => "Interpretação",
            ErrorType::Attention => "Atenção/Distração",
            ErrorType::Time => "Tempo Insuficiente",
            ErrorType::Calculation => "Cálculo/Sinal",
            ErrorType::Trick => "Pegadinha",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match fold_accents(&s.trim().to_lowercase()).as_str() {
            "content" | "falta de conteudo" | "conteudo" => Some(ErrorType::MissingContent),
            "interpretation" | "interpretacao" => Some(ErrorType::Interpretation),
            "attention" | "atencao/distracao" | "atencao" | "distracao" => {
                Some(ErrorType::Attention)
            }
            "time" | "tempo insuficiente" | "tempo" => Some(ErrorType::Time),
            "calculation" | "calculo/sinal" | "calculo" | "sinal" => Some(ErrorType::Calculation),
            "trick" | "pegadinha" => Some(ErrorType::Trick),
            _ => None,
        }
    }
}

// One missed question as stored with its session. The error type is kept as
// text so rows written by older clients still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrongQuestion {
    #[serde(rename = "ref", default)]
    pub reference: String,
    #[serde(rename = "type", default)]
    pub error_type: String,
}

impl WrongQuestion {
    pub fn new(reference: impl Into<String>, error_type: ErrorType) -> Self {
        Self {
            reference: reference.into(),
            error_type: error_type.label().to_string(),
        }
    }
}

/// A session row exactly as the store holds it.
///
/// Numeric and date cells are kept as text so a malformed row can be loaded
/// and reported instead of failing the whole read. [`Session::from_record`]
/// turns it into a usable session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "loose_string")]
    pub subject: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub topic: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub timestamp: Option<String>,
    #[serde(default, alias = "totalQuestions", deserialize_with = "loose_text")]
    pub total: Option<String>,
    #[serde(default, alias = "correctQuestions", deserialize_with = "loose_text")]
    pub correct: Option<String>,
    #[serde(default, deserialize_with = "loose_wrong_questions")]
    pub wrong_questions: Vec<WrongQuestion>,
    /// Whether the subject was discursive when the session was logged.
    #[serde(default, deserialize_with = "loose_flag", skip_serializing_if = "Option::is_none")]
    pub is_discursive: Option<bool>,
}

fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_text(deserializer)?.unwrap_or_default())
}

// Null or a non-list reads as no wrong questions; unreadable entries are dropped.
fn loose_wrong_questions<'de, D>(deserializer: D) -> Result<Vec<WrongQuestion>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn loose_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(serde_json::Value::deserialize(deserializer)?.as_bool())
}

fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

// Integers may arrive as "10", 10 or 10.0 depending on the writer.
fn parse_count(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 {
        Some(f as i64)
    } else {
        None
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Percentage of correct answers, `0.0` when no questions were answered.
pub fn accuracy(correct: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (correct as f64 / total as f64) * 100.0
    }
}

/// A validated practice session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: Option<i64>,
    pub subject: String,
    pub topic: String,
    /// `None` when the stored date could not be read.
    pub date: Option<NaiveDate>,
    pub timestamp: i64,
    pub total: i64,
    pub correct: i64,
    pub wrong_questions: Vec<WrongQuestion>,
}

impl Session {
    /// Returns `None` for rows without a usable timestamp or counts.
    pub fn from_record(record: &SessionRecord) -> Option<Self> {
        let timestamp = parse_count(record.timestamp.as_deref())?;
        let total = parse_count(record.total.as_deref()).filter(|n| *n >= 0)?;
        let correct = parse_count(record.correct.as_deref()).filter(|n| *n >= 0)?;

        Some(Self {
            id: record.id,
            subject: record.subject.clone(),
            topic: record.topic.clone(),
            date: record.date.as_deref().and_then(parse_date),
            timestamp,
            total,
            correct,
            wrong_questions: record.wrong_questions.clone(),
        })
    }

    pub fn accuracy(&self) -> f64 {
        accuracy(self.correct, self.total)
    }

    pub fn key(&self) -> TopicKey {
        TopicKey::new(&self.subject, &self.topic)
    }
}

/// A session accepted by the log form, ready to append to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSession {
    pub subject: Subject,
    /// Text written to the subject column. Usually the label.
    pub subject_text: String,
    pub topic: String,
    pub date: NaiveDate,
    pub total: i64,
    pub correct: i64,
    pub wrong_questions: Vec<WrongQuestion>,
}

impl NewSession {
    pub fn key(&self) -> TopicKey {
        TopicKey::new(&self.subject_text, &self.topic)
    }

    pub fn accuracy(&self) -> f64 {
        accuracy(self.correct, self.total)
    }
}

/// Scheduling identity of a topic: the subject plus the trimmed, lower-cased
/// topic text.
///
/// There is no stored topic entity. Renaming a topic, or fixing a typo in it,
/// therefore starts a new lineage with no history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TopicKey {
    subject: String,
    topic: String,
}

impl TopicKey {
    pub fn new(subject: &str, topic: &str) -> Self {
        Self {
            subject: subject.to_string(),
            topic: normalize_topic(topic),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Key under which a manual date pin for this topic is stored.
    pub fn override_key(&self) -> String {
        format!("{}-{}", self.subject, self.topic).replace('/', "-")
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.subject, self.topic)
    }
}

pub fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub key: String,
    pub date: String,
}

// Manual date pins keyed by override key, at most one per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides(BTreeMap<String, String>);

impl Overrides {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

#[cfg(test)]
impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, date: impl Into<String>) {
        self.0.insert(key.into(), date.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Override> for Overrides {
    fn from_iter<I: IntoIterator<Item = Override>>(iter: I) -> Self {
        Self(iter.into_iter().map(|o| (o.key, o.date)).collect())
    }
}

// Maturity tier, decided by the accuracy of a lineage's first session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
}

impl Tier {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy < 70.0 {
            Tier::A
        } else if accuracy <= 85.0 {
            Tier::B
        } else {
            Tier::C
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::A => "Case A",
            Tier::B => "Case B",
            Tier::C => "Case C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Low => "low",
        }
    }
}

/// Branch of the review policy a lineage currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Case {
    #[serde(rename = "Case A - Demoted")]
    Demoted,
    #[serde(rename = "Case A - Rescue")]
    Rescue,
    #[serde(rename = "Case A - Stability Test")]
    StabilityTest,
    #[serde(rename = "Case A - Repeat D+1")]
    RepeatNextDay,
    #[serde(rename = "Case A → C")]
    PromotedToC,
    #[serde(rename = "Case A → B")]
    PromotedToB,
    #[serde(rename = "Permanent Maintenance")]
    PermanentMaintenance,
    #[serde(rename = "Case B - Polishing")]
    Polishing,
    #[serde(rename = "Case B → C")]
    ConsolidatedToC,
    #[serde(rename = "Case B - Fixation")]
    Fixation,
    #[serde(rename = "Case C → B")]
    DroppedToB,
    #[serde(rename = "Case C - Mastery")]
    Mastery,
    #[serde(rename = "Case C - Long-Term Maintenance")]
    LongTermMaintenance,
}

impl Case {
    pub fn label(&self) -> &'static str {
        match self {
            Case::Demoted => "Case A - Demoted",
            Case::Rescue => "Case A - Rescue",
            Case::StabilityTest => "Case A - Stability Test",
            Case::RepeatNextDay => "Case A - Repeat D+1",
            Case::PromotedToC => "Case A → C",
            Case::PromotedToB => "Case A → B",
            Case::PermanentMaintenance => "Permanent Maintenance",
            Case::Polishing => "Case B - Polishing",
            Case::ConsolidatedToC => "Case B → C",
            Case::Fixation => "Case B - Fixation",
            Case::DroppedToB => "Case C → B",
            Case::Mastery => "Case C - Mastery",
            Case::LongTermMaintenance => "Case C - Long-Term Maintenance",
        }
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One scheduled review for one lineage. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub key: TopicKey,
    pub due_date: NaiveDate,
    pub subject: String,
    /// Topic as typed in the latest session.
    pub topic: String,
    pub action: String,
    pub case: Case,
    pub tier: Tier,
    pub urgency: Urgency,
    pub accuracy: f64,
    pub session_ordinal: usize,
    pub days_from_latest: i64,
    pub overridden: bool,
    pub override_key: String,
    pub wrong_questions: Vec<WrongQuestion>,
}

impl Projection {
    pub fn case_label(&self) -> &'static str {
        self.case.label()
    }
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
