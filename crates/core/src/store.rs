//! Storage seams. Pipelines, the monitor and the orchestrator only reach
//! persistence through these traits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{
    CaseKey, CaseObservation, Disease, GroupKey, Prediction, PredictionKey, WeatherSample,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Predicate for case counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFilter {
    All,
    /// Temperature and humidity both present.
    WithWeather,
    MissingTemperature,
    MissingHumidity,
    MissingRainfall,
}

impl CaseFilter {
    pub fn matches(&self, case: &CaseObservation) -> bool {
        match self {
            CaseFilter::All => true,
            CaseFilter::WithWeather => case.has_weather(),
            CaseFilter::MissingTemperature => case.temperature.is_none(),
            CaseFilter::MissingHumidity => case.humidity.is_none(),
            CaseFilter::MissingRainfall => case.rainfall.is_none(),
        }
    }
}

/// Grouping dimension for case counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseField {
    Disease,
    Region,
}

/// One forecastable group with its history extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    #[serde(flatten)]
    pub group: GroupKey,
    pub count: u64,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Insert or replace the record with the same natural key.
    async fn upsert_case(&self, case: CaseObservation) -> Result<UpsertOutcome, StoreError>;

    async fn find_case(&self, key: &CaseKey) -> Result<Option<CaseObservation>, StoreError>;

    /// Merge `sample` into every case of `region` dated at or after `since`.
    /// Returns the number of records modified.
    async fn update_recent_weather(
        &self,
        region: &str,
        since: DateTime<Utc>,
        sample: &WeatherSample,
    ) -> Result<u64, StoreError>;

    /// Merge `sample` into the single case identified by `key`.
    async fn set_case_weather(
        &self,
        key: &CaseKey,
        sample: &WeatherSample,
    ) -> Result<bool, StoreError>;

    /// Cases of `region` dated at or after `since` lacking any weather field.
    async fn cases_missing_weather(
        &self,
        region: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CaseObservation>, StoreError>;

    /// History of one group dated at or after `since`, ascending by date.
    async fn case_history(
        &self,
        group: &GroupKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<CaseObservation>, StoreError>;

    /// Groups with at least `min_count` records, sorted by count descending.
    async fn group_counts(
        &self,
        disease: Option<Disease>,
        min_count: u64,
    ) -> Result<Vec<GroupSummary>, StoreError>;

    /// Distinct case regions in ascending order, optionally truncated.
    async fn distinct_regions(&self, limit: Option<usize>) -> Result<Vec<String>, StoreError>;

    /// Latest case date; with `with_weather`, only cases carrying weather.
    async fn latest_case_date(&self, with_weather: bool)
        -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn count_cases(&self, filter: CaseFilter) -> Result<u64, StoreError>;

    async fn count_cases_by(&self, field: CaseField) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Earliest and latest case date, `None` when empty.
    async fn case_date_bounds(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, StoreError>;
}

#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn upsert_prediction(&self, prediction: Prediction) -> Result<UpsertOutcome, StoreError>;

    async fn find_prediction(&self, key: &PredictionKey)
        -> Result<Option<Prediction>, StoreError>;

    async fn latest_forecast_date(&self) -> Result<Option<NaiveDate>, StoreError>;

    async fn count_predictions(&self) -> Result<u64, StoreError>;
}
