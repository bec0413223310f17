//! Wire stores, upstream clients, pipelines and schedulers from `Config`.

use std::sync::Arc;

use tracing::{info, warn};

use medsentinel_core::Config;
use medsentinel_forecast::{HttpForecastClient, Orchestrator};
use medsentinel_ingest::sources::{
    DiseaseShClient, NewsApiClient, OpenMeteoClient, OpenWeatherClient,
};
use medsentinel_ingest::{
    AuxiliaryPipeline, DiseasePipeline, RegionSelection, WeatherBackfill, WeatherPipeline,
    WeatherSource,
};
use medsentinel_monitor::Monitor;
use medsentinel_scheduler::{EtlPipelines, EtlScheduler, ForecastScheduler, JobRunner};
use medsentinel_storage::Stores;

use crate::state::AppState;

pub async fn build_app_state(config: Config) -> anyhow::Result<AppState> {
    let stores = Stores::open(&config.storage).await?;
    Ok(build_with_stores(config, stores))
}

pub fn build_with_stores(config: Config, stores: Stores) -> AppState {
    let monitor = Arc::new(Monitor::new(stores.cases.clone(), stores.predictions.clone()));
    let runner = JobRunner::new(monitor.clone());

    // Upstream sources.
    let primary_weather: Arc<dyn WeatherSource> = Arc::new(OpenMeteoClient::new(&config.weather));
    let fallback_weather = match OpenWeatherClient::from_config(&config.weather) {
        Some(client) => Some(Arc::new(client) as Arc<dyn WeatherSource>),
        None => {
            warn!("OpenWeatherMap API key not configured, weather fallback disabled");
            None
        }
    };

    let disease = DiseasePipeline::new(
        Arc::new(DiseaseShClient::new(&config.disease_source)),
        stores.cases.clone(),
        &config.disease_source,
    );
    let weather = WeatherPipeline::new(
        primary_weather.clone(),
        fallback_weather,
        stores.cases.clone(),
        RegionSelection::FromStore {
            limit: config.scheduler.weather_region_limit,
        },
    );
    let auxiliary = config.auxiliary_source.enabled.then(|| {
        AuxiliaryPipeline::new(
            Arc::new(NewsApiClient::new(&config.auxiliary_source)),
            stores.cases.clone(),
            true,
            config.disease_source.country.clone(),
        )
    });

    let etl = EtlScheduler::new(
        EtlPipelines {
            disease,
            weather,
            auxiliary,
        },
        runner.clone(),
        config.scheduler.clone(),
    );

    let orchestrator = Arc::new(Orchestrator::new(
        stores.cases.clone(),
        stores.predictions.clone(),
        Arc::new(HttpForecastClient::new(&config.forecast)),
        config.forecast.clone(),
    ));
    let forecasts = ForecastScheduler::new(orchestrator.clone(), runner, config.scheduler.clone());

    let backfill = WeatherBackfill::new(primary_weather, stores.cases.clone(), &config.weather);

    info!("Application state ready");
    AppState {
        config,
        stores,
        monitor,
        orchestrator,
        etl,
        forecasts,
        backfill,
    }
}
