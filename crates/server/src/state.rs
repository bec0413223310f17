use std::sync::Arc;

use medsentinel_core::Config;
use medsentinel_forecast::Orchestrator;
use medsentinel_ingest::WeatherBackfill;
use medsentinel_monitor::Monitor;
use medsentinel_scheduler::{EtlScheduler, ForecastScheduler};
use medsentinel_storage::Stores;

/// Everything a command needs, built once in `main` and passed by reference.
pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub monitor: Arc<Monitor>,
    pub orchestrator: Arc<Orchestrator>,
    pub etl: EtlScheduler,
    pub forecasts: ForecastScheduler,
    pub backfill: WeatherBackfill,
}
