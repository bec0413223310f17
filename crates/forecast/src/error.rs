use thiserror::Error;

use medsentinel_core::StoreError;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("insufficient historical data for {group}: need at least {need} days, got {got}")]
    InsufficientData { group: String, got: usize, need: usize },

    #[error("forecasting service is not available: {0}")]
    CollaboratorUnavailable(String),

    #[error("forecasting service error: {0}")]
    Collaborator(String),

    #[error("invalid forecast response: {0}")]
    InvalidResponse(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
