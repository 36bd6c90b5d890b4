//! Error types for the cmas_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cmas_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An exercise score outside `0..=max_score`
    #[error("Invalid score range for exercise '{exercise}': {score} (allowed 0 to {max_score})")]
    InvalidScore {
        exercise: String,
        score: f64,
        max_score: f64,
    },

    /// Wrong number of exercises in a measurement
    #[error("{required} exercises required, got {actual}")]
    ExerciseCount { required: usize, actual: usize },

    /// Malformed submission (empty names, duplicates, bad dates, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Percentage requested against a zero maximum
    #[error("Division by zero: maximum score must be greater than zero")]
    DivisionByZero,

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Patient registry error
    #[error("Registry error: {0}")]
    Registry(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for rejected input (bad scores, wrong count, malformed fields).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidScore { .. } | Error::ExerciseCount { .. } | Error::Validation(_)
        )
    }
}
