use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Rejections from the session log form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Topic is required")]
    MissingTopic,

    #[error("Unknown subject '{0}'. Run `revisor subjects` for the list")]
    UnknownSubject(String),

    #[error("'{field}' must be a whole number, got '{value}'")]
    NotANumber { field: &'static str, value: String },

    #[error("Total questions must be at least 1")]
    NoQuestions,

    #[error("Correct answers ({correct}) cannot exceed total questions ({total})")]
    TooManyCorrect { correct: i64, total: i64 },

    #[error("Invalid date '{0}'. Use YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid wrong question '{0}'. Use REF:TYPE, e.g. Q3:pegadinha")]
    InvalidWrongQuestion(String),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read import file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Import file is not a JSON array of sessions: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}
