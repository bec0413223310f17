use thiserror::Error;

use medsentinel_core::StoreError;

/// Failure to obtain data from an upstream source.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("coordinates not found for region: {0}")]
    UnknownRegion(String),

    #[error("source not configured: {0}")]
    NotConfigured(String),
}

/// Failure of a pipeline run as a whole.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("load failed: {0}")]
    Load(#[from] StoreError),

    /// Nothing to do; not a failure.
    #[error("skipped: {0}")]
    Skipped(String),
}

impl PipelineError {
    pub fn is_skipped(&self) -> bool {
        matches!(self, PipelineError::Skipped(_))
    }
}
