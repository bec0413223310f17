use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use medsentinel_core::config::SchedulerConfig;
use medsentinel_core::ConfigError;
use medsentinel_forecast::{ForecastRunOptions, ForecastSummary, Orchestrator};

use crate::error::SchedulerError;
use crate::runner::JobRunner;
use crate::schedule::{CronScheduler, Job, ScheduledJob};

pub const FORECAST_JOB: &str = "dailyForecasts";

struct ForecastJob {
    orchestrator: Arc<Orchestrator>,
    runner: JobRunner,
}

impl ForecastJob {
    async fn run_all(
        &self,
        options: &ForecastRunOptions,
    ) -> Result<ForecastSummary, SchedulerError> {
        self.runner
            .run(FORECAST_JOB, async {
                self.orchestrator
                    .generate_all(options)
                    .await
                    .map_err(SchedulerError::from)
            })
            .await
    }
}

#[async_trait]
impl Job for ForecastJob {
    fn name(&self) -> &str {
        FORECAST_JOB
    }

    async fn run(&self) -> Result<(), SchedulerError> {
        self.run_all(&ForecastRunOptions::default()).await.map(drop)
    }
}

/// Daily fan-out of forecasts over every eligible group.
pub struct ForecastScheduler {
    job: Arc<ForecastJob>,
    cron: CronScheduler,
    config: SchedulerConfig,
}

impl ForecastScheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        runner: JobRunner,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            job: Arc::new(ForecastJob {
                orchestrator,
                runner,
            }),
            cron: CronScheduler::new(Duration::from_secs(config.poll_interval_secs)),
            config,
        }
    }

    pub fn start(&self) -> Result<(), ConfigError> {
        if !self.config.forecast_enabled {
            info!("Forecast scheduler is disabled");
            return Ok(());
        }
        self.cron.register(self.job.clone(), &self.config.forecast_cron)?;
        self.cron.start();
        Ok(())
    }

    pub fn stop(&self) {
        self.cron.stop();
    }

    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.cron.jobs()
    }

    pub async fn trigger_all_forecasts(
        &self,
        options: ForecastRunOptions,
    ) -> Result<ForecastSummary, SchedulerError> {
        self.job.run_all(&options).await
    }
}
