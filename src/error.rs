//! Error types for the warehouse ETL pipeline
//!
//! Every fatal error surfaces as a non-zero process exit with a logged
//! cause. Consistency mismatches are deliberately not errors; they are
//! reported through [`crate::quality::CheckOutcome`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during a pipeline run
#[derive(Error, Debug)]
pub enum EtlError {
    /// Missing or invalid configuration file, or invalid log level
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured source file does not exist on disk
    #[error("Source file not found: {0}")]
    SourceUnavailable(PathBuf),

    /// Database unreachable or authentication failure
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// DDL failure while (re)creating the warehouse schema
    #[error("Schema initialization failed: {0}")]
    Schema(String),

    /// Malformed source content or bulk-append failure
    #[error("Load failed for table '{table}': {reason}")]
    Load { table: String, reason: String },

    /// SQL failure in a set-based transform
    #[error("Transform '{name}' failed: {reason}")]
    Transform { name: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type EtlResult<T> = Result<T, EtlError>;

impl EtlError {
    /// Create a load error for a staging table
    pub fn load(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create a transform error
    pub fn transform(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transform {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Process exit status for this error
    ///
    /// All fatal errors currently map to 1; the mapping lives here so the
    /// CLI never has to inspect variants.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            EtlError::Config(msg) => {
                format!("Configuration error: {msg}\n\nHint: Check the config file path and contents.")
            }
            EtlError::SourceUnavailable(path) => {
                format!(
                    "Source file not found: {}\n\nHint: Fix the path in the config file and rerun. \
                    No schema reset was performed.",
                    path.display()
                )
            }
            EtlError::Connection(msg) => {
                format!(
                    "Database connection failed: {msg}\n\nHint: Check connectivity and that \
                    PG_PASSWORD is set."
                )
            }
            _ => self.to_string(),
        }
    }
}

impl From<tokio_postgres::Error> for EtlError {
    fn from(err: tokio_postgres::Error) -> Self {
        EtlError::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EtlError::load("stage_demo", "bad row");
        assert!(err.to_string().contains("stage_demo"));
        assert!(err.to_string().contains("bad row"));

        let err = EtlError::transform("fact_temp", "constraint violation");
        assert!(err.to_string().contains("fact_temp"));
    }

    #[test]
    fn test_exit_codes_nonzero() {
        assert_ne!(EtlError::Config("x".into()).exit_code(), 0);
        assert_ne!(
            EtlError::SourceUnavailable(PathBuf::from("/missing.json")).exit_code(),
            0
        );
    }

    #[test]
    fn test_user_message_hints() {
        let err = EtlError::SourceUnavailable(PathBuf::from("/data/demo.json"));
        let msg = err.user_message();
        assert!(msg.contains("/data/demo.json"));
        assert!(msg.contains("Hint:"));
        assert!(msg.contains("No schema reset"));
    }
}
