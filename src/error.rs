use crate::model::QueryType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NlSqlError {
    #[error("Unsupported query type: {0}")]
    UnsupportedQueryType(QueryType),

    #[error("Security rejection: {reason} ({context})")]
    SecurityRejection { reason: String, context: String },

    #[error("Failed to execute query: {0}")]
    ExecutionFailure(String),

    // Store-level failure before the guard wraps it
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NlSqlError {
    pub fn security(reason: impl Into<String>, context: impl Into<String>) -> Self {
        NlSqlError::SecurityRejection {
            reason: reason.into(),
            context: context.into(),
        }
    }

    /// Stable, machine-readable failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            NlSqlError::UnsupportedQueryType(_) => "unsupported_query_type",
            NlSqlError::SecurityRejection { .. } => "security_rejection",
            NlSqlError::ExecutionFailure(_) => "execution_failure",
            NlSqlError::Database(_) => "database",
            NlSqlError::Config(_) => "config",
            NlSqlError::Io(_) => "io",
            NlSqlError::Json(_) => "json",
        }
    }
}

impl From<rusqlite::Error> for NlSqlError {
    fn from(err: rusqlite::Error) -> Self {
        NlSqlError::Database(err.to_string())
    }
}

/// Structured failure handed back to the pipeline's caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDescription {
    pub kind: String,
    pub message: String,
}

impl From<&NlSqlError> for FailureDescription {
    fn from(err: &NlSqlError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NlSqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_description_carries_kind_and_message() {
        let err = NlSqlError::security("dangerous keyword", "drop");
        let failure = FailureDescription::from(&err);

        assert_eq!(failure.kind, "security_rejection");
        assert_eq!(failure.message, "Security rejection: dangerous keyword (drop)");
    }

    #[test]
    fn test_rusqlite_error_maps_to_database() {
        let err: NlSqlError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(err.kind(), "database");
    }
}
