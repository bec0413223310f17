//! Wire format of the forecasting service and orchestration summaries.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use medsentinel_core::{Disease, GroupKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub date: DateTime<Utc>,
    pub cases: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rainfall: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub region: String,
    pub district: String,
    pub state: String,
    pub disease: Disease,
    pub historical_data: Vec<HistoricalPoint>,
    pub forecast_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// RFC 3339, naive ISO datetime, or plain date.
    pub date: String,
    pub predicted_cases: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ForecastPoint {
    pub fn forecast_date(&self) -> Option<NaiveDate> {
        let s = self.date.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc).date_naive());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(dt.date());
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub region: String,
    pub district: String,
    pub state: String,
    pub disease: String,
    pub forecast_points: Vec<ForecastPoint>,
    pub confidence: f64,
    pub risk_level: String,
    pub risk_score: f64,
    pub model_version: String,
}

/// Outcome for one group of an orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    pub success: bool,
    #[serde(flatten)]
    pub group: GroupKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub success: bool,
    pub message: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<GroupResult>,
}
