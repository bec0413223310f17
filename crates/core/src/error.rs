use thiserror::Error;

/// Errors returned by storage collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The record violates the document schema (required field, range).
    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors raised while validating configuration at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("invalid cron expression for {key}: {expr}")]
    InvalidCron { key: String, expr: String },
}
