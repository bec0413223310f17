pub mod error;
pub mod memory;
pub mod postgres;
pub mod seed;

use std::sync::Arc;

use tracing::info;

use medsentinel_core::config::{StorageBackend, StorageConfig};
use medsentinel_core::{CaseStore, PredictionStore};

pub use error::StorageError;
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use seed::{generate_cases, seed_cases, SeedOptions, SeedSummary};

/// Case and prediction stores sharing one backend.
#[derive(Clone)]
pub struct Stores {
    pub cases: Arc<dyn CaseStore>,
    pub predictions: Arc<dyn PredictionStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            cases: store.clone(),
            predictions: store,
        }
    }

    /// Open the configured backend.
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        match config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage (data is lost on exit)");
                Ok(Self::in_memory())
            }
            StorageBackend::Postgres => {
                let store = Arc::new(PgStore::connect(&config.postgres).await?);
                Ok(Self {
                    cases: store.clone(),
                    predictions: store,
                })
            }
        }
    }
}
