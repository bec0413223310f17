use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use medsentinel_core::config::ForecastConfig;
use medsentinel_core::{
    CaseStore, ConfidenceInterval, Disease, ExtensionMap, GroupKey, GroupSummary, Prediction,
    PredictionStore, RiskLevel, Scalar,
};

use crate::client::ForecastClient;
use crate::error::ForecastError;
use crate::types::{
    ForecastRequest, ForecastResponse, ForecastSummary, GroupResult, HistoricalPoint,
};

/// Knobs for one orchestration run. `None` falls back to configuration.
#[derive(Debug, Clone, Default)]
pub struct ForecastRunOptions {
    pub disease: Option<Disease>,
    pub horizon_days: Option<u32>,
}

/// Result of forecasting one group and persisting its points.
#[derive(Debug, Clone)]
pub struct GroupForecast {
    pub group: GroupKey,
    pub response: ForecastResponse,
    pub saved_count: usize,
}

pub struct Orchestrator {
    cases: Arc<dyn CaseStore>,
    predictions: Arc<dyn PredictionStore>,
    client: Arc<dyn ForecastClient>,
    config: ForecastConfig,
}

impl Orchestrator {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        predictions: Arc<dyn PredictionStore>,
        client: Arc<dyn ForecastClient>,
        config: ForecastConfig,
    ) -> Self {
        Self {
            cases,
            predictions,
            client,
            config,
        }
    }

    pub async fn check_health(&self) -> bool {
        self.client.health().await
    }

    /// Groups with enough history to forecast, largest first.
    pub async fn available_regions(
        &self,
        disease: Option<Disease>,
    ) -> Result<Vec<GroupSummary>, ForecastError> {
        let groups = self
            .cases
            .group_counts(disease, self.config.min_data_points as u64)
            .await?;
        Ok(groups)
    }

    /// Last `history_days` of one group, ascending by date.
    pub async fn historical_data(
        &self,
        group: &GroupKey,
    ) -> Result<Vec<HistoricalPoint>, ForecastError> {
        let since = Utc::now() - Duration::days(i64::from(self.config.history_days));
        let history = self.cases.case_history(group, since).await?;
        Ok(history
            .into_iter()
            .map(|case| HistoricalPoint {
                date: case.date,
                cases: case.new_cases,
                temperature: case.temperature,
                humidity: case.humidity,
                rainfall: case.rainfall,
            })
            .collect())
    }

    /// Ask the collaborator for a forecast of one group without persisting it.
    pub async fn generate_forecast(
        &self,
        group: &GroupKey,
        horizon_days: Option<u32>,
    ) -> Result<(ForecastResponse, usize), ForecastError> {
        let history = self.historical_data(group).await?;
        if history.len() < self.config.min_data_points {
            return Err(ForecastError::InsufficientData {
                group: group.to_string(),
                got: history.len(),
                need: self.config.min_data_points,
            });
        }

        if !self.client.health().await {
            return Err(ForecastError::CollaboratorUnavailable(
                "health check did not report ok".to_string(),
            ));
        }

        let history_len = history.len();
        let request = ForecastRequest {
            region: group.region.clone(),
            district: group.district.clone(),
            state: group.state.clone(),
            disease: group.disease,
            historical_data: history,
            forecast_days: horizon_days.unwrap_or(self.config.horizon_days),
        };
        let response = self.client.forecast(&request).await?;
        Ok((response, history_len))
    }

    /// Forecast one group and upsert one prediction per forecast point.
    pub async fn generate_and_save(
        &self,
        group: &GroupKey,
        horizon_days: Option<u32>,
    ) -> Result<GroupForecast, ForecastError> {
        let (response, history_len) = self.generate_forecast(group, horizon_days).await?;
        let predictions = to_predictions(group, &response, history_len)?;

        for prediction in &predictions {
            self.predictions.upsert_prediction(prediction.clone()).await?;
        }

        info!(
            group = %group,
            saved = predictions.len(),
            model = %response.model_version,
            "Forecast saved"
        );
        Ok(GroupForecast {
            group: group.clone(),
            saved_count: predictions.len(),
            response,
        })
    }

    /// Forecast every eligible group in turn. A failing group is reported in
    /// the summary and never stops the rest.
    pub async fn generate_all(
        &self,
        options: &ForecastRunOptions,
    ) -> Result<ForecastSummary, ForecastError> {
        let groups = self.available_regions(options.disease).await?;
        if groups.is_empty() {
            warn!("No groups with sufficient data for forecasting");
            return Ok(ForecastSummary {
                success: true,
                message: "No regions with sufficient data".to_string(),
                total: 0,
                successful: 0,
                failed: 0,
                results: Vec::new(),
            });
        }

        info!(groups = groups.len(), "Generating forecasts");
        let mut results = Vec::with_capacity(groups.len());
        for summary in groups {
            let group = summary.group;
            match self.generate_and_save(&group, options.horizon_days).await {
                Ok(done) => results.push(GroupResult {
                    success: true,
                    group,
                    saved_count: Some(done.saved_count),
                    error: None,
                }),
                Err(e) => {
                    error!(group = %group, error = %e, "Forecast failed");
                    results.push(GroupResult {
                        success: false,
                        group,
                        saved_count: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let successful = results.iter().filter(|r| r.success).count();
        let failed = results.len() - successful;
        info!(successful, failed, "Forecast run complete");

        Ok(ForecastSummary {
            success: true,
            message: format!("Generated forecasts for {successful} regions"),
            total: results.len(),
            successful,
            failed,
            results,
        })
    }
}

fn to_predictions(
    group: &GroupKey,
    response: &ForecastResponse,
    history_len: usize,
) -> Result<Vec<Prediction>, ForecastError> {
    let risk_level: RiskLevel = response
        .risk_level
        .parse()
        .map_err(ForecastError::InvalidResponse)?;

    let mut snapshot = ExtensionMap::new();
    snapshot.insert("historicalDays".into(), Scalar::from(history_len as i64));
    snapshot.insert(
        "forecastDays".into(),
        Scalar::from(response.forecast_points.len() as i64),
    );

    let mut predictions = Vec::with_capacity(response.forecast_points.len());
    for point in &response.forecast_points {
        let forecast_date = point.forecast_date().ok_or_else(|| {
            ForecastError::InvalidResponse(format!("unparseable forecast date '{}'", point.date))
        })?;
        let predicted = to_count("predicted_cases", point.predicted_cases)?;
        let lower = to_count("lower_bound", point.lower_bound)?;
        let upper = to_count("upper_bound", point.upper_bound)?;

        let prediction = Prediction {
            region: group.region.clone(),
            district: group.district.clone(),
            state: group.state.clone(),
            disease: group.disease,
            forecast_date,
            predicted_cases: predicted,
            confidence: response.confidence,
            confidence_interval: ConfidenceInterval {
                lower: lower.min(upper),
                upper: lower.max(upper),
            },
            risk_level,
            risk_score: response.risk_score,
            model_version: response.model_version.clone(),
            feature_snapshot: snapshot.clone(),
        };
        prediction
            .check()
            .map_err(|e| ForecastError::InvalidResponse(e.to_string()))?;
        predictions.push(prediction);
    }
    Ok(predictions)
}

/// Round to the nearest whole case, clamped at zero.
fn to_count(field: &str, value: f64) -> Result<u64, ForecastError> {
    if !value.is_finite() {
        return Err(ForecastError::InvalidResponse(format!(
            "{field} is not a finite number"
        )));
    }
    Ok(value.round().max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ForecastPoint;

    fn group() -> GroupKey {
        GroupKey {
            region: "Pune".into(),
            district: "Pune".into(),
            state: "Maharashtra".into(),
            disease: Disease::Dengue,
        }
    }

    fn response(points: Vec<ForecastPoint>) -> ForecastResponse {
        ForecastResponse {
            region: "ignored".into(),
            district: "ignored".into(),
            state: "ignored".into(),
            disease: "Dengue".into(),
            forecast_points: points,
            confidence: 0.8,
            risk_level: "medium".into(),
            risk_score: 0.45,
            model_version: "prophet-1.0".into(),
        }
    }

    fn point(date: &str, predicted: f64, lower: f64, upper: f64) -> ForecastPoint {
        ForecastPoint {
            date: date.into(),
            predicted_cases: predicted,
            lower_bound: lower,
            upper_bound: upper,
        }
    }

    #[test]
    fn rounds_and_clamps_points() {
        let resp = response(vec![point("2024-08-03T00:00:00", 12.6, -3.2, 20.4)]);
        let predictions = to_predictions(&group(), &resp, 30).unwrap();

        assert_eq!(predictions.len(), 1);
        let p = &predictions[0];
        assert_eq!(p.predicted_cases, 13);
        assert_eq!(p.confidence_interval, ConfidenceInterval { lower: 0, upper: 20 });
        assert_eq!(p.region, "Pune");
        assert_eq!(p.risk_level, RiskLevel::Medium);
        assert_eq!(p.feature_snapshot["historicalDays"], Scalar::Integer(30));
        assert_eq!(p.feature_snapshot["forecastDays"], Scalar::Integer(1));
    }

    #[test]
    fn rejects_malformed_points() {
        let bad_date = response(vec![point("soon", 1.0, 0.0, 2.0)]);
        assert!(matches!(
            to_predictions(&group(), &bad_date, 7),
            Err(ForecastError::InvalidResponse(_))
        ));

        let nan = response(vec![point("2024-08-03", f64::NAN, 0.0, 2.0)]);
        assert!(matches!(
            to_predictions(&group(), &nan, 7),
            Err(ForecastError::InvalidResponse(_))
        ));

        let mut bad_risk = response(vec![point("2024-08-03", 1.0, 0.0, 2.0)]);
        bad_risk.risk_level = "extreme".into();
        assert!(matches!(
            to_predictions(&group(), &bad_risk, 7),
            Err(ForecastError::InvalidResponse(_))
        ));
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let mut resp = response(vec![point("2024-08-03", 1.0, 0.0, 2.0)]);
        resp.confidence = 1.5;
        assert!(matches!(
            to_predictions(&group(), &resp, 7),
            Err(ForecastError::InvalidResponse(_))
        ));
    }
}
