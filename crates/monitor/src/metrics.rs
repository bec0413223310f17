use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

// ── Freshness ─────────────────────────────────────────────────

/// (fresh below, stale below) in hours.
pub const CASE_THRESHOLDS: (f64, f64) = (24.0, 48.0);
pub const WEATHER_THRESHOLDS: (f64, f64) = (6.0, 12.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Stale,
    Outdated,
}

impl Freshness {
    pub fn classify(age_hours: f64, (fresh, stale): (f64, f64)) -> Self {
        if age_hours < fresh {
            Freshness::Fresh
        } else if age_hours < stale {
            Freshness::Stale
        } else {
            Freshness::Outdated
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessMetric {
    pub latest_date: DateTime<Utc>,
    /// Rounded to two decimals.
    pub age_hours: f64,
    pub freshness: Freshness,
}

impl FreshnessMetric {
    pub fn measure(latest: DateTime<Utc>, now: DateTime<Utc>, thresholds: (f64, f64)) -> Self {
        let age_hours = (now - latest).num_milliseconds() as f64 / 3_600_000.0;
        Self {
            latest_date: latest,
            age_hours: (age_hours * 100.0).round() / 100.0,
            freshness: Freshness::classify(age_hours, thresholds),
        }
    }
}

/// A category without data has no metric at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataFreshness {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cases: Option<FreshnessMetric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<FreshnessMetric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions: Option<FreshnessMetric>,
}

// ── Quality ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingFields {
    pub temperature: u64,
    pub humidity: u64,
    pub rainfall: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub days_covered: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub total_cases: u64,
    pub cases_with_weather: u64,
    pub cases_without_weather: u64,
    pub missing_data: MissingFields,
    pub cases_by_disease: BTreeMap<String, u64>,
    pub cases_by_region: BTreeMap<String, u64>,
    pub date_range: DateRange,
}

impl DataQuality {
    /// Percentage of cases carrying weather. Zero cases counts as 0 %.
    pub fn weather_coverage(&self) -> f64 {
        if self.total_cases == 0 {
            return 0.0;
        }
        self.cases_with_weather as f64 / self.total_cases as f64 * 100.0
    }
}

// ── Health ────────────────────────────────────────────────────

pub const MIN_WEATHER_COVERAGE: f64 = 50.0;
pub const MIN_CASE_VOLUME: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Freshness,
    Quality,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataHealth {
    pub healthy: bool,
    pub issues: Vec<HealthIssue>,
    pub freshness: DataFreshness,
    pub quality: DataQuality,
}

impl DataHealth {
    pub fn assess(freshness: DataFreshness, quality: DataQuality) -> Self {
        let mut issues = Vec::new();

        let outdated = |m: &&FreshnessMetric| m.freshness == Freshness::Outdated;
        if let Some(cases) = freshness.cases.as_ref().filter(outdated) {
            issues.push(HealthIssue {
                kind: IssueKind::Freshness,
                severity: Severity::High,
                message: format!("Case data is outdated ({} hours old)", cases.age_hours),
            });
        }
        if let Some(weather) = freshness.weather.as_ref().filter(outdated) {
            issues.push(HealthIssue {
                kind: IssueKind::Freshness,
                severity: Severity::Medium,
                message: format!("Weather data is outdated ({} hours old)", weather.age_hours),
            });
        }

        let coverage = quality.weather_coverage();
        if coverage < MIN_WEATHER_COVERAGE {
            issues.push(HealthIssue {
                kind: IssueKind::Quality,
                severity: Severity::Medium,
                message: format!("Only {coverage:.1}% of cases have weather data"),
            });
        }
        if quality.total_cases < MIN_CASE_VOLUME {
            issues.push(HealthIssue {
                kind: IssueKind::Quality,
                severity: Severity::Low,
                message: format!("Low data volume: only {} cases in database", quality.total_cases),
            });
        }

        Self {
            healthy: issues.is_empty(),
            issues,
            freshness,
            quality,
        }
    }
}
