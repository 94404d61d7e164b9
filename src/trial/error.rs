//! Trial engine error taxonomy.
//!
//! Every user-visible variant names the stage or rule that failed.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum TrialError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Fatal, raised before any mutation.
    #[error("Precondition failed in {stage}: {reason}")]
    Precondition { stage: &'static str, reason: String },

    /// Invalid combination of options, rejected at the API boundary.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Too little data for a statistic the output requires.
    #[error("Cannot compute {stage}: {reason}")]
    Degenerate { stage: &'static str, reason: String },

    /// A self-check failed. Indicates a bug, never recoverable.
    #[error("Invariant violated in {stage}: {reason}")]
    Invariant { stage: &'static str, reason: String },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrialError {
    pub fn precondition(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Precondition { stage, reason: reason.into() }
    }

    pub fn degenerate(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Degenerate { stage, reason: reason.into() }
    }

    pub fn invariant(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Invariant { stage, reason: reason.into() }
    }
}

impl From<rusqlite::Error> for TrialError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_stage() {
        let err = TrialError::precondition("randomisation", "Should not randomise twice");
        assert_eq!(
            err.to_string(),
            "Precondition failed in randomisation: Should not randomise twice"
        );
        let err = TrialError::degenerate("years_since_retraction quartiles", "bin edges must be unique");
        assert!(err.to_string().contains("years_since_retraction quartiles"));
    }
}
