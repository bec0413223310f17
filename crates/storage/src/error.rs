use thiserror::Error;

use medsentinel_core::StoreError;

/// Errors raised while opening a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
