use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

// ── Enumerations ──────────────────────────────────────────────

/// Tracked diseases. The wire form matches the upstream document schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Disease {
    Dengue,
    Malaria,
    #[serde(rename = "COVID-19")]
    Covid19,
    Flu,
    Cholera,
    Other,
}

impl Disease {
    pub const ALL: [Disease; 6] = [
        Disease::Dengue,
        Disease::Malaria,
        Disease::Covid19,
        Disease::Flu,
        Disease::Cholera,
        Disease::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Disease::Dengue => "Dengue",
            Disease::Malaria => "Malaria",
            Disease::Covid19 => "COVID-19",
            Disease::Flu => "Flu",
            Disease::Cholera => "Cholera",
            Disease::Other => "Other",
        }
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disease {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dengue" => Ok(Disease::Dengue),
            "malaria" => Ok(Disease::Malaria),
            "covid-19" | "covid19" | "covid" => Ok(Disease::Covid19),
            "flu" | "influenza" => Ok(Disease::Flu),
            "cholera" => Ok(Disease::Cholera),
            "other" => Ok(Disease::Other),
            other => Err(format!("unknown disease: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

// ── Extension map ─────────────────────────────────────────────

/// Scalar value carried in an [`ExtensionMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON value; objects, arrays and nulls have no scalar form.
    pub fn from_json(value: &serde_json::Value) -> Option<Scalar> {
        match value {
            serde_json::Value::Bool(b) => Some(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Scalar::Integer)
                .or_else(|| n.as_f64().map(Scalar::Number)),
            serde_json::Value::String(s) => Some(Scalar::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Integer(n)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// Open provenance/debugging data. Never read by invariants.
pub type ExtensionMap = BTreeMap<String, Scalar>;

// ── Keys ──────────────────────────────────────────────────────

/// Natural key of a case observation: one live record per calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseKey {
    pub region: String,
    pub district: String,
    pub disease: Disease,
    pub day: NaiveDate,
}

impl fmt::Display for CaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.region, self.district, self.disease, self.day)
    }
}

/// Identity of a forecastable series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub region: String,
    pub district: String,
    pub state: String,
    pub disease: Disease,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.region, self.district, self.disease)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PredictionKey {
    pub region: String,
    pub district: String,
    pub disease: Disease,
    pub forecast_date: NaiveDate,
}

impl fmt::Display for PredictionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.region, self.district, self.disease, self.forecast_date
        )
    }
}

// ── Case observation ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseObservation {
    pub region: String,
    pub district: String,
    pub state: String,
    pub disease: Disease,
    pub date: DateTime<Utc>,
    pub new_cases: u64,
    pub total_cases: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rainfall: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_source: Option<String>,
    pub source: String,
    #[serde(default)]
    pub extension: ExtensionMap,
}

impl CaseObservation {
    /// A bare observation with no weather or extension data.
    pub fn new(
        region: impl Into<String>,
        district: impl Into<String>,
        state: impl Into<String>,
        disease: Disease,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            region: region.into(),
            district: district.into(),
            state: state.into(),
            disease,
            date,
            new_cases: 0,
            total_cases: 0,
            population: None,
            temperature: None,
            humidity: None,
            rainfall: None,
            weather_updated_at: None,
            weather_source: None,
            source: String::new(),
            extension: ExtensionMap::new(),
        }
    }

    pub fn key(&self) -> CaseKey {
        CaseKey {
            region: self.region.clone(),
            district: self.district.clone(),
            disease: self.disease,
            day: self.date.date_naive(),
        }
    }

    pub fn group(&self) -> GroupKey {
        GroupKey {
            region: self.region.clone(),
            district: self.district.clone(),
            state: self.state.clone(),
            disease: self.disease,
        }
    }

    /// Weather coverage requires both temperature and humidity.
    pub fn has_weather(&self) -> bool {
        self.temperature.is_some() && self.humidity.is_some()
    }

    pub fn missing_any_weather(&self) -> bool {
        self.temperature.is_none() || self.humidity.is_none() || self.rainfall.is_none()
    }

    /// Merge a weather sample. Rainfall is only overwritten when present.
    /// The sample's extension keys and provenance land in `extension`.
    pub fn apply_weather(&mut self, sample: &WeatherSample, stamped_at: DateTime<Utc>) {
        if sample.temperature.is_some() {
            self.temperature = sample.temperature;
        }
        if sample.humidity.is_some() {
            self.humidity = sample.humidity;
        }
        if sample.rainfall.is_some() {
            self.rainfall = sample.rainfall;
        }
        self.weather_updated_at = Some(stamped_at);
        self.weather_source = Some(sample.source_tag.clone());
        self.extension.extend(sample.extension_patch(stamped_at));
    }

    /// Schema-level validation applied by every store before writing.
    pub fn check(&self) -> Result<(), StoreError> {
        non_empty("region", &self.region)?;
        non_empty("district", &self.district)?;
        non_empty("state", &self.state)?;
        check_weather(self.temperature, self.humidity, self.rainfall)
    }
}

// ── Weather sample ────────────────────────────────────────────

/// Transient normalized weather reading; merged into recent cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSample {
    pub region: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub rainfall: Option<f64>,
    pub source_tag: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub extension: ExtensionMap,
}

impl WeatherSample {
    pub fn check(&self) -> Result<(), StoreError> {
        non_empty("region", &self.region)?;
        check_weather(self.temperature, self.humidity, self.rainfall)
    }

    /// Extension entries written onto a case when this sample is merged:
    /// the sample's own keys plus `weatherUpdatedAt` and `weatherSource`.
    pub fn extension_patch(&self, stamped_at: DateTime<Utc>) -> ExtensionMap {
        let mut patch = self.extension.clone();
        patch.insert("weatherUpdatedAt".into(), stamped_at.to_rfc3339().into());
        patch.insert("weatherSource".into(), self.source_tag.as_str().into());
        patch
    }
}

// ── Prediction ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: u64,
    pub upper: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub region: String,
    pub district: String,
    pub state: String,
    pub disease: Disease,
    pub forecast_date: NaiveDate,
    pub predicted_cases: u64,
    pub confidence: f64,
    pub confidence_interval: ConfidenceInterval,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub model_version: String,
    #[serde(default)]
    pub feature_snapshot: ExtensionMap,
}

impl Prediction {
    pub fn key(&self) -> PredictionKey {
        PredictionKey {
            region: self.region.clone(),
            district: self.district.clone(),
            disease: self.disease,
            forecast_date: self.forecast_date,
        }
    }

    pub fn check(&self) -> Result<(), StoreError> {
        non_empty("region", &self.region)?;
        non_empty("district", &self.district)?;
        non_empty("state", &self.state)?;
        unit_interval("confidence", self.confidence)?;
        unit_interval("riskScore", self.risk_score)?;
        if self.confidence_interval.lower > self.confidence_interval.upper {
            return Err(StoreError::Invalid(format!(
                "confidenceInterval lower {} exceeds upper {}",
                self.confidence_interval.lower, self.confidence_interval.upper
            )));
        }
        Ok(())
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        Err(StoreError::Invalid(format!("{field} is required")))
    } else {
        Ok(())
    }
}

fn unit_interval(field: &str, value: f64) -> Result<(), StoreError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!("{field} must be within [0, 1], got {value}")))
    }
}

fn check_weather(
    temperature: Option<f64>,
    humidity: Option<f64>,
    rainfall: Option<f64>,
) -> Result<(), StoreError> {
    for (field, value) in [
        ("temperature", temperature),
        ("humidity", humidity),
        ("rainfall", rainfall),
    ] {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(StoreError::Invalid(format!("{field} must be finite")));
            }
        }
    }
    if let Some(h) = humidity {
        if !(0.0..=100.0).contains(&h) {
            return Err(StoreError::Invalid(format!("humidity must be within [0, 100], got {h}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn case() -> CaseObservation {
        let date = Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap();
        CaseObservation::new("Pune", "Pune", "Maharashtra", Disease::Dengue, date)
    }

    #[test]
    fn disease_wire_names() {
        assert_eq!(serde_json::to_string(&Disease::Covid19).unwrap(), "\"COVID-19\"");
        assert_eq!("covid-19".parse::<Disease>().unwrap(), Disease::Covid19);
        assert_eq!("Dengue".parse::<Disease>().unwrap(), Disease::Dengue);
        assert!("measles".parse::<Disease>().is_err());
    }

    #[test]
    fn key_uses_utc_calendar_day() {
        let key = case().key();
        assert_eq!(key.day, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(key.to_string(), "Pune/Pune/Dengue/2024-03-10");
    }

    #[test]
    fn weather_merge_keeps_rainfall_when_absent() {
        let mut c = case();
        c.rainfall = Some(4.2);
        let sample = WeatherSample {
            region: "Pune".into(),
            temperature: Some(31.0),
            humidity: Some(60.0),
            rainfall: None,
            source_tag: "openmeteo".into(),
            captured_at: Utc::now(),
            extension: ExtensionMap::new(),
        };
        c.apply_weather(&sample, Utc::now());
        assert_eq!(c.temperature, Some(31.0));
        assert_eq!(c.rainfall, Some(4.2));
        assert_eq!(c.weather_source.as_deref(), Some("openmeteo"));
        assert!(c.has_weather());
    }

    #[test]
    fn weather_merge_records_provenance_in_extension() {
        let mut c = case();
        c.extension.insert("deaths".into(), Scalar::Integer(2));
        let mut extension = ExtensionMap::new();
        extension.insert("description".into(), "light rain".into());
        let sample = WeatherSample {
            region: "Pune".into(),
            temperature: Some(27.0),
            humidity: Some(80.0),
            rainfall: Some(1.5),
            source_tag: "openweathermap".into(),
            captured_at: Utc::now(),
            extension,
        };
        let stamped_at = Utc::now();
        c.apply_weather(&sample, stamped_at);

        let text = |k: &str| c.extension.get(k).and_then(|v| v.as_text()).map(str::to_string);
        assert_eq!(text("weatherSource").as_deref(), Some("openweathermap"));
        assert_eq!(text("weatherUpdatedAt"), Some(stamped_at.to_rfc3339()));
        assert_eq!(text("description").as_deref(), Some("light rain"));
        assert_eq!(c.extension.get("deaths"), Some(&Scalar::Integer(2)));
    }

    #[test]
    fn check_rejects_bad_records() {
        let mut c = case();
        c.state = " ".into();
        assert!(c.check().is_err());

        let mut c = case();
        c.humidity = Some(140.0);
        assert!(c.check().is_err());

        let mut c = case();
        c.temperature = Some(f64::NAN);
        assert!(c.check().is_err());

        assert!(case().check().is_ok());
    }

    #[test]
    fn prediction_ranges() {
        let mut p = Prediction {
            region: "Pune".into(),
            district: "Pune".into(),
            state: "Maharashtra".into(),
            disease: Disease::Dengue,
            forecast_date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            predicted_cases: 12,
            confidence: 0.8,
            confidence_interval: ConfidenceInterval { lower: 8, upper: 16 },
            risk_level: RiskLevel::Medium,
            risk_score: 0.4,
            model_version: "v1".into(),
            feature_snapshot: ExtensionMap::new(),
        };
        assert!(p.check().is_ok());
        p.risk_score = 1.3;
        assert!(p.check().is_err());
        p.risk_score = 0.4;
        p.confidence_interval = ConfidenceInterval { lower: 20, upper: 16 };
        assert!(p.check().is_err());
    }

    #[test]
    fn scalar_from_json() {
        assert_eq!(Scalar::from_json(&serde_json::json!(3)), Some(Scalar::Integer(3)));
        assert_eq!(Scalar::from_json(&serde_json::json!(2.5)), Some(Scalar::Number(2.5)));
        assert_eq!(Scalar::from_json(&serde_json::json!("x")), Some(Scalar::from("x")));
        assert_eq!(Scalar::from_json(&serde_json::json!({"a": 1})), None);
    }
}
