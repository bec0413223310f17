use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use tracing::info;
use uuid::Uuid;

use medsentinel_core::{CaseField, CaseFilter, CaseStore, PredictionStore, StoreError};

use crate::history::{JobExecutionRecord, JobHistory, JobStatistics, JobStatus};
use crate::metrics::{
    DataFreshness, DataHealth, DataQuality, DateRange, FreshnessMetric, MissingFields,
    CASE_THRESHOLDS, WEATHER_THRESHOLDS,
};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Observes stored data and owns the job-execution history.
pub struct Monitor {
    cases: Arc<dyn CaseStore>,
    predictions: Arc<dyn PredictionStore>,
    history: JobHistory,
}

impl Monitor {
    pub fn new(cases: Arc<dyn CaseStore>, predictions: Arc<dyn PredictionStore>) -> Self {
        Self {
            cases,
            predictions,
            history: JobHistory::default(),
        }
    }

    pub fn record_job_execution(
        &self,
        job_name: &str,
        status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> JobExecutionRecord {
        let record = JobExecutionRecord {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            status,
            timestamp: Utc::now(),
            result,
            error,
        };
        self.history.push(record.clone());
        info!(job = job_name, status = %status, "Job execution recorded");
        record
    }

    pub async fn data_freshness(&self) -> Result<DataFreshness, StoreError> {
        self.data_freshness_at(Utc::now()).await
    }

    pub async fn data_freshness_at(&self, now: DateTime<Utc>) -> Result<DataFreshness, StoreError> {
        let cases = self.cases.latest_case_date(false).await?;
        let weather = self.cases.latest_case_date(true).await?;
        let predictions = self
            .predictions
            .latest_forecast_date()
            .await?
            .map(|day| day.and_time(NaiveTime::MIN).and_utc());

        Ok(DataFreshness {
            cases: cases.map(|d| FreshnessMetric::measure(d, now, CASE_THRESHOLDS)),
            weather: weather.map(|d| FreshnessMetric::measure(d, now, WEATHER_THRESHOLDS)),
            predictions: predictions.map(|d| FreshnessMetric::measure(d, now, CASE_THRESHOLDS)),
        })
    }

    pub async fn data_quality(&self) -> Result<DataQuality, StoreError> {
        let total_cases = self.cases.count_cases(CaseFilter::All).await?;
        let cases_with_weather = self.cases.count_cases(CaseFilter::WithWeather).await?;

        let missing_data = MissingFields {
            temperature: self.cases.count_cases(CaseFilter::MissingTemperature).await?,
            humidity: self.cases.count_cases(CaseFilter::MissingHumidity).await?,
            rainfall: self.cases.count_cases(CaseFilter::MissingRainfall).await?,
        };

        let date_range = match self.cases.case_date_bounds().await? {
            Some((earliest, latest)) => DateRange {
                earliest: Some(earliest),
                latest: Some(latest),
                days_covered: ((latest - earliest).num_seconds() as f64 / 86_400.0).round() as i64,
            },
            None => DateRange::default(),
        };

        Ok(DataQuality {
            total_cases,
            cases_with_weather,
            cases_without_weather: total_cases.saturating_sub(cases_with_weather),
            missing_data,
            cases_by_disease: self.cases.count_cases_by(CaseField::Disease).await?,
            cases_by_region: self.cases.count_cases_by(CaseField::Region).await?,
            date_range,
        })
    }

    pub async fn check_data_health(&self) -> Result<DataHealth, StoreError> {
        self.check_data_health_at(Utc::now()).await
    }

    pub async fn check_data_health_at(&self, now: DateTime<Utc>) -> Result<DataHealth, StoreError> {
        let freshness = self.data_freshness_at(now).await?;
        let quality = self.data_quality().await?;
        Ok(DataHealth::assess(freshness, quality))
    }

    pub fn job_statistics(&self) -> JobStatistics {
        self.history.statistics()
    }

    /// Most recent `limit` executions (default 50), newest first.
    pub fn job_history(&self, limit: Option<usize>) -> Vec<JobExecutionRecord> {
        self.history.recent(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
    }
}
