use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use medsentinel_core::config::SchedulerConfig;
use medsentinel_core::ConfigError;
use medsentinel_ingest::{AuxiliaryPipeline, DiseasePipeline, LoadResult, Pipeline, WeatherPipeline};

use crate::error::SchedulerError;
use crate::runner::JobRunner;
use crate::schedule::{CronScheduler, Job, ScheduledJob};

pub const DISEASE_JOB: &str = "diseaseData";
pub const WEATHER_JOB: &str = "weatherData";
pub const AUXILIARY_JOB: &str = "auxiliaryData";

/// The ingestion pipelines driven by the ETL scheduler. `auxiliary` is
/// `None` when auxiliary ingestion is disabled.
pub struct EtlPipelines {
    pub disease: DiseasePipeline,
    pub weather: WeatherPipeline,
    pub auxiliary: Option<AuxiliaryPipeline>,
}

struct EtlJobs {
    pipelines: EtlPipelines,
    runner: JobRunner,
}

impl EtlJobs {
    async fn disease(&self) -> Result<LoadResult, SchedulerError> {
        self.runner
            .run(DISEASE_JOB, async {
                self.pipelines.disease.execute().await.map_err(SchedulerError::from)
            })
            .await
    }

    async fn weather(&self, regions: Option<Vec<String>>) -> Result<LoadResult, SchedulerError> {
        self.runner
            .run(WEATHER_JOB, async {
                let result = match regions {
                    Some(regions) => self.pipelines.weather.with_regions(regions).execute().await,
                    None => self.pipelines.weather.execute().await,
                };
                result.map_err(SchedulerError::from)
            })
            .await
    }

    async fn auxiliary(&self) -> Result<LoadResult, SchedulerError> {
        self.runner
            .run(AUXILIARY_JOB, async {
                match &self.pipelines.auxiliary {
                    Some(pipeline) => pipeline.execute().await.map_err(SchedulerError::from),
                    None => Err(SchedulerError::Skipped(
                        "auxiliary ingestion is disabled".to_string(),
                    )),
                }
            })
            .await
    }
}

#[derive(Clone, Copy)]
enum EtlJobKind {
    Disease,
    Weather,
    Auxiliary,
}

struct EtlJob {
    kind: EtlJobKind,
    jobs: Arc<EtlJobs>,
}

#[async_trait]
impl Job for EtlJob {
    fn name(&self) -> &str {
        match self.kind {
            EtlJobKind::Disease => DISEASE_JOB,
            EtlJobKind::Weather => WEATHER_JOB,
            EtlJobKind::Auxiliary => AUXILIARY_JOB,
        }
    }

    async fn run(&self) -> Result<(), SchedulerError> {
        match self.kind {
            EtlJobKind::Disease => self.jobs.disease().await.map(drop),
            EtlJobKind::Weather => self.jobs.weather(None).await.map(drop),
            EtlJobKind::Auxiliary => self.jobs.auxiliary().await.map(drop),
        }
    }
}

/// Periodic ingestion: disease data daily, weather every six hours and,
/// when enabled, auxiliary news daily.
pub struct EtlScheduler {
    jobs: Arc<EtlJobs>,
    cron: CronScheduler,
    config: SchedulerConfig,
}

impl EtlScheduler {
    pub fn new(pipelines: EtlPipelines, runner: JobRunner, config: SchedulerConfig) -> Self {
        Self {
            jobs: Arc::new(EtlJobs { pipelines, runner }),
            cron: CronScheduler::new(Duration::from_secs(config.poll_interval_secs)),
            config,
        }
    }

    fn job(&self, kind: EtlJobKind) -> Arc<dyn Job> {
        Arc::new(EtlJob {
            kind,
            jobs: self.jobs.clone(),
        })
    }

    /// Register the jobs and start the tick loop. No-op when the ETL
    /// scheduler is disabled.
    pub fn start(&self) -> Result<(), ConfigError> {
        if !self.config.etl_enabled {
            info!("ETL scheduler is disabled");
            return Ok(());
        }

        self.cron.register(self.job(EtlJobKind::Disease), &self.config.disease_cron)?;
        self.cron.register(self.job(EtlJobKind::Weather), &self.config.weather_cron)?;
        if self.jobs.pipelines.auxiliary.is_some() {
            self.cron
                .register(self.job(EtlJobKind::Auxiliary), &self.config.auxiliary_cron)?;
        }
        self.cron.start();
        Ok(())
    }

    pub fn stop(&self) {
        self.cron.stop();
    }

    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.cron.jobs()
    }

    pub async fn trigger_disease_data(&self) -> Result<LoadResult, SchedulerError> {
        self.jobs.disease().await
    }

    /// Manual weather run, optionally limited to explicit regions.
    pub async fn trigger_weather_data(
        &self,
        regions: Option<Vec<String>>,
    ) -> Result<LoadResult, SchedulerError> {
        self.jobs.weather(regions).await
    }

    pub async fn trigger_auxiliary_data(&self) -> Result<LoadResult, SchedulerError> {
        self.jobs.auxiliary().await
    }
}
