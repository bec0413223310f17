//! Historical weather for cases ingested without it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use medsentinel_core::config::WeatherConfig;
use medsentinel_core::{find_region, CaseStore};

use crate::error::PipelineError;
use crate::pipeline::LoadError;
use crate::sources::WeatherSource;
use crate::weather::normalize_daily;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillResult {
    pub updated: u64,
    pub errors: Vec<LoadError>,
    /// Regions without registry coordinates.
    pub skipped_regions: Vec<String>,
}

#[derive(Clone)]
pub struct WeatherBackfill {
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn CaseStore>,
    days: u32,
    delay: Duration,
}

impl WeatherBackfill {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        store: Arc<dyn CaseStore>,
        config: &WeatherConfig,
    ) -> Self {
        Self {
            source,
            store,
            days: config.backfill_days,
            delay: Duration::from_millis(config.backfill_delay_ms),
        }
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fill weather for cases of `regions` (all stored regions when `None`)
    /// within the configured window. One upstream call per case, paced by
    /// the configured delay.
    pub async fn run(&self, regions: Option<Vec<String>>) -> Result<BackfillResult, PipelineError> {
        let regions = match regions {
            Some(r) => r,
            None => self.store.distinct_regions(None).await?,
        };
        let since = Utc::now() - chrono::Duration::days(self.days as i64);
        info!(regions = regions.len(), days = self.days, "Starting weather backfill");

        let mut result = BackfillResult::default();
        for name in regions {
            let Some(region) = find_region(&name) else {
                warn!(region = %name, "Skipping region without coordinates");
                result.skipped_regions.push(name);
                continue;
            };

            let cases = self.store.cases_missing_weather(region.region, since).await?;
            info!(region = region.region, cases = cases.len(), "Backfilling region");

            for case in cases {
                let key = case.key();
                let outcome = async {
                    let payload = self.source.daily(region, key.day).await?;
                    let sample = normalize_daily(region.region, &payload, Utc::now())?;
                    Ok::<bool, PipelineError>(self.store.set_case_weather(&key, &sample).await?)
                }
                .await;

                match outcome {
                    Ok(true) => {
                        result.updated += 1;
                        if result.updated % 10 == 0 {
                            info!(updated = result.updated, "Backfill progress");
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(case = %key, error = %e, "Failed to backfill case");
                        result.errors.push(LoadError {
                            key: key.to_string(),
                            error: e.to_string(),
                        });
                    }
                }

                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
            }
        }

        info!(
            updated = result.updated,
            errors = result.errors.len(),
            "Weather backfill completed"
        );
        Ok(result)
    }
}
